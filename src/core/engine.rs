// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Alert pipeline engine
//!
//! One `Engine` is built at startup and shared as `Arc<Engine>` between the
//! stream worker and any number of discrete callers. Every shared piece of
//! state sits behind its own lock; none of them is held across an await or
//! across another component's lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::{Config, DetectionConfig};
use crate::db::{EventRecord, EventStore};
use crate::detection::{AlertLatch, CooldownGate, DetectionResult};
use crate::inference::{Frame, InferenceAdapter, RemoteDetectorFactory};
use crate::notify::{GeoLocation, NotificationDispatcher, NotificationEvent};
use crate::settings::{SettingsStore, SettingsUpdate, SettingsView};
use super::{
    Clock, EngineError, Event, EventBus, FrameReport, FrameStatus, LogEntry, LogLevel,
    PipelineStatus, StageOutcome, SystemClock,
};

/// Prebuilt components for [`Engine::from_parts`]
pub struct EngineParts {
    pub detection: DetectionConfig,
    pub adapter: InferenceAdapter,
    pub store: EventStore,
    pub dispatcher: NotificationDispatcher,
    pub settings: Arc<SettingsStore>,
    pub bus: Arc<EventBus>,
    pub clock: Arc<dyn Clock>,
}

/// Main FallWatch engine
pub struct Engine {
    latch: AlertLatch,
    cooldown: CooldownGate,
    adapter: InferenceAdapter,
    store: Arc<EventStore>,
    dispatcher: NotificationDispatcher,
    settings: Arc<SettingsStore>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    location: RwLock<Option<GeoLocation>>,
    room_label: String,
    running: AtomicBool,
    frames_processed: AtomicU64,
    alerts_sent: AtomicU64,
}

impl Engine {
    /// Build the engine with the remote detector and the real transports
    pub fn new(config: &Config) -> Self {
        let bus = Arc::new(EventBus::default());
        let settings = Arc::new(SettingsStore::load(&config.settings_path()));
        let dispatcher = NotificationDispatcher::with_default_transports(
            settings.clone(),
            bus.clone(),
            config.notify.clone(),
        );
        let adapter = InferenceAdapter::new(
            Box::new(RemoteDetectorFactory::new(config.inference.clone())),
            config.inference.timeout(),
        );

        Self::from_parts(EngineParts {
            detection: config.detection.clone(),
            adapter,
            store: EventStore::open(&config.history()),
            dispatcher,
            settings,
            bus,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn from_parts(parts: EngineParts) -> Self {
        Self {
            latch: AlertLatch::new(parts.detection.latch_window()),
            cooldown: CooldownGate::new(parts.detection.cooldown()),
            adapter: parts.adapter,
            store: Arc::new(parts.store),
            dispatcher: parts.dispatcher,
            settings: parts.settings,
            bus: parts.bus,
            clock: parts.clock,
            location: RwLock::new(None),
            room_label: parts.detection.room_label,
            running: AtomicBool::new(false),
            frames_processed: AtomicU64::new(0),
            alerts_sent: AtomicU64::new(0),
        }
    }

    pub fn start(&self) {
        info!("Starting FallWatch engine...");
        self.running.store(true, Ordering::SeqCst);
        self.bus.log(LogLevel::Info, "System started");
    }

    pub fn stop(&self) {
        info!("Stopping FallWatch engine...");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Load the detector ahead of the first frame
    pub async fn warm_up(&self) {
        match self.adapter.get_or_init().await {
            Ok(detector) => self
                .bus
                .log(LogLevel::Success, format!("AI system online ({})", detector.name())),
            Err(e) => self.bus.log(LogLevel::Error, e.to_string()),
        }
    }

    /// Run one discrete frame through the pipeline
    pub async fn process_frame(&self, bytes: Vec<u8>) -> FrameReport {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);

        let frame = match self.decode(bytes).await {
            StageOutcome::Ok(frame) => frame,
            StageOutcome::Recoverable(e) | StageOutcome::Fatal(e) => {
                debug!("Rejected frame: {}", e);
                return FrameReport::failed(FrameStatus::Error, e);
            }
        };

        // Transient inference failures count as "nothing detected"
        let detections = match self.infer(&frame).await.fail_open(Vec::new()) {
            Ok(detections) => detections,
            Err(e) => return FrameReport::failed(FrameStatus::AiError, e),
        };

        let alert_active = self.observe(&frame, &detections).await;
        FrameReport {
            status: if alert_active {
                FrameStatus::FallDetected
            } else {
                FrameStatus::Normal
            },
            detections,
            alert_active,
            error: None,
        }
    }

    async fn decode(&self, bytes: Vec<u8>) -> StageOutcome<Frame> {
        match tokio::task::spawn_blocking(move || Frame::decode(bytes)).await {
            Ok(Ok(frame)) => StageOutcome::Ok(frame),
            Ok(Err(e)) => StageOutcome::Fatal(e.to_string()),
            Err(e) => StageOutcome::Recoverable(format!("decoder task failed: {}", e)),
        }
    }

    async fn infer(&self, frame: &Frame) -> StageOutcome<DetectionResult> {
        match self.adapter.process(frame).await {
            Ok(detections) => StageOutcome::Ok(detections),
            Err(e) if e.is_permanent() => StageOutcome::Fatal(e.to_string()),
            Err(e) => {
                warn!("Inference error, continuing without detections: {}", e);
                StageOutcome::Recoverable(e.to_string())
            }
        }
    }

    /// Feed detections into the latch; returns whether the alert is active
    async fn observe(&self, frame: &Frame, detections: &[crate::detection::Detection]) -> bool {
        let now = self.clock.now();
        if self.latch.observe(detections, now) {
            self.raise_alert(frame, now).await;
        }
        self.latch.is_active(now)
    }

    async fn raise_alert(&self, frame: &Frame, now: Instant) {
        // The window is consumed here and never handed back, even if every
        // channel later fails.
        if !self.cooldown.try_acquire(now) {
            self.bus.log(LogLevel::Alert, "Alert cooldown active, skipping");
            return;
        }
        self.bus.log(LogLevel::Alert, "FALL DETECTED! Processing alerts...");

        let at = self.clock.wall();
        let record = EventRecord::fall(at, &self.room_label);
        let store = self.store.clone();
        let recorded = tokio::task::spawn_blocking(move || store.append(record));

        let location = self.location.read().clone();
        let event = NotificationEvent::new(at, frame.encoded_shared(), location);
        self.bus.publish_alert(event.id);
        self.dispatcher.dispatch(event);
        self.alerts_sent.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = recorded.await {
            error!("Recording fall event failed: {}", e);
        }
    }

    /// Replace the last known location
    pub fn update_location(&self, lat: f64, lng: f64) -> Result<GeoLocation, EngineError> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        if !valid {
            return Err(EngineError::InvalidLocation { lat, lng });
        }

        let location = GeoLocation::new(lat, lng);
        *self.location.write() = Some(location.clone());
        debug!("Location updated: {}", location.map_link);
        Ok(location)
    }

    pub fn location(&self) -> Option<GeoLocation> {
        self.location.read().clone()
    }

    /// Clear the alert. A fall processed after this call raises it again.
    pub fn reset_alert(&self) {
        self.latch.reset();
        self.bus.log(LogLevel::Info, "Alert reset by user");
        self.bus.publish_reset();
    }

    pub fn alert_active(&self) -> bool {
        self.latch.is_active(self.clock.now())
    }

    /// Event history, newest first
    pub fn history(&self) -> Vec<EventRecord> {
        self.store.list()
    }

    pub async fn clear_history(&self) {
        let store = self.store.clone();
        on_blocking_pool("clearing history", move || store.clear()).await;
        self.bus.log(LogLevel::Info, "Event history cleared");
    }

    /// Merge a settings update; the next alert uses it
    pub async fn update_settings(&self, update: SettingsUpdate) -> SettingsView {
        self.store_settings(update).await;
        self.bus.log(LogLevel::Success, "Settings saved");
        self.bus.publish_settings_changed();
        self.settings.view()
    }

    /// Register the push device token of a client
    pub async fn register_client(&self, token: &str) -> Result<(), EngineError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(EngineError::EmptyToken);
        }

        self.store_settings(SettingsUpdate::device_token(token)).await;
        self.bus.log(LogLevel::Info, "Push client registered");
        self.bus.publish_settings_changed();
        Ok(())
    }

    async fn store_settings(&self, update: SettingsUpdate) {
        let settings = self.settings.clone();
        on_blocking_pool("saving settings", move || {
            settings.update(update);
        })
        .await;
    }

    pub fn settings_view(&self) -> SettingsView {
        self.settings.view()
    }

    /// Append to the operator-facing system log
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.bus.log(level, message);
    }

    pub fn system_logs(&self) -> Vec<LogEntry> {
        self.bus.system_logs()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe_events()
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            running: self.running.load(Ordering::SeqCst),
            ai_ready: self.adapter.is_ready(),
            ai_error: self.adapter.init_error().map(|e| e.to_string()),
            alert_active: self.alert_active(),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
        }
    }
}

/// Store calls hold their lock across file I/O, so they run off the async workers
async fn on_blocking_pool<F>(what: &str, work: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Err(e) = tokio::task::spawn_blocking(work).await {
        error!("{} failed: {}", what, e);
    }
}
