// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Notification module - fans a confirmed alert out to push, email and chat
//!
//! Every enabled channel gets its own detached task with its own timeout.
//! A channel that fails, hangs or panics cannot delay or cancel its
//! siblings, and the caller never waits on any of them.

mod task;
mod push;
mod email;
mod chat;

pub use task::*;
pub use push::*;
pub use email::*;
pub use chat::*;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::core::{EventBus, LogLevel};
use crate::settings::SettingsStore;

/// Delivery errors, local to one channel's task
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid channel configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build payload: {0}")]
    Payload(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Notification channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Push,
    Email,
    Chat,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Push => write!(f, "push"),
            Channel::Email => write!(f, "email"),
            Channel::Chat => write!(f, "chat"),
        }
    }
}

/// Last known location of the monitored person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
    pub map_link: String,
}

impl GeoLocation {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            map_link: format!("https://www.google.com/maps?q={},{}", lat, lng),
        }
    }
}

/// Encoded snapshot image attached to alerts
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub bytes: Arc<Vec<u8>>,
    pub mime: &'static str,
    pub extension: &'static str,
}

impl Snapshot {
    /// Wrap encoded image bytes, sniffing the format. Unknown formats are
    /// sent as JPEG.
    pub fn new(bytes: Arc<Vec<u8>>) -> Self {
        let (mime, extension) = match image::guess_format(&bytes) {
            Ok(image::ImageFormat::Png) => ("image/png", "png"),
            _ => ("image/jpeg", "jpg"),
        };
        Self { bytes, mime, extension }
    }

    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One confirmed alert, handed to the dispatcher. Not persisted.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Local>,
    pub snapshot: Snapshot,
    pub location: Option<GeoLocation>,
}

impl NotificationEvent {
    pub fn new(timestamp: DateTime<Local>, snapshot: Arc<Vec<u8>>, location: Option<GeoLocation>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            snapshot: Snapshot::new(snapshot),
            location,
        }
    }

    pub fn time_label(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn map_link(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.map_link.as_str())
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Channel settings document, relative to the data directory
    pub settings_path: std::path::PathBuf,

    /// Product name used in email subjects
    pub product_name: String,

    pub push_timeout_secs: u64,
    pub email_timeout_secs: u64,
    pub chat_timeout_secs: u64,

    /// Messaging API base URL
    pub fcm_api_base: String,

    /// Bot API base URL
    pub telegram_api_base: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            settings_path: std::path::PathBuf::from(crate::config::SETTINGS_FILE),
            product_name: "FallWatch".to_string(),
            push_timeout_secs: 10,
            email_timeout_secs: 20,
            chat_timeout_secs: 15,
            fcm_api_base: FCM_API_BASE.to_string(),
            telegram_api_base: TELEGRAM_API_BASE.to_string(),
        }
    }
}

impl NotifyConfig {
    pub fn timeout(&self, channel: Channel) -> Duration {
        Duration::from_secs(match channel {
            Channel::Push => self.push_timeout_secs,
            Channel::Email => self.email_timeout_secs,
            Channel::Chat => self.chat_timeout_secs,
        })
    }
}

/// Push payload for an alert
pub fn push_message(event: &NotificationEvent, device_token: &str) -> PushMessage {
    let mut body = "A fall has been detected! Please check immediately.".to_string();
    if let Some(link) = event.map_link() {
        body.push_str(&format!(" Location: {}", link));
    }

    let mut data = BTreeMap::new();
    data.insert("risk_level".to_string(), "HIGH".to_string());
    data.insert("timestamp".to_string(), event.time_label());
    data.insert("location_link".to_string(), event.map_link().unwrap_or_default().to_string());

    PushMessage {
        token: device_token.to_string(),
        title: "URGENT: Fall Detected!".to_string(),
        body,
        data,
    }
}

/// Email payload for an alert
pub fn email_message(event: &NotificationEvent, product_name: &str) -> EmailMessage {
    let mut body = "⚠️ A fall event has been detected by the AI monitoring system.\n\n".to_string();
    body.push_str(&format!("Time: {}\n", event.time_label()));
    body.push_str(&format!("Location: {}\n", event.map_link().unwrap_or("N/A")));
    body.push_str("\nPlease check the attached snapshot and verify the situation.");

    EmailMessage {
        subject: format!("URGENT: Fall Detected - {}", product_name),
        body,
        attachment: (!event.snapshot.is_empty()).then(|| event.snapshot.clone()),
    }
}

/// Chat-bot caption for an alert (Telegram Markdown)
pub fn chat_caption(event: &NotificationEvent) -> String {
    let mut caption = "⚠️ *FALL DETECTED!* ⚠️\n\n".to_string();
    caption.push_str(&format!("⏰ Time: {}\n", event.time_label()));
    if let Some(link) = event.map_link() {
        caption.push_str(&format!("📍 Location: [Map]({})\n", link));
    }
    caption.push_str("\n_Please check immediately._");
    caption
}

/// Fans alerts out to every deliverable channel
pub struct NotificationDispatcher {
    settings: Arc<SettingsStore>,
    push: Arc<dyn PushTransport>,
    mail: Arc<dyn MailTransport>,
    chat: Arc<dyn ChatTransport>,
    bus: Arc<EventBus>,
    config: NotifyConfig,
}

impl NotificationDispatcher {
    pub fn new(
        settings: Arc<SettingsStore>,
        push: Arc<dyn PushTransport>,
        mail: Arc<dyn MailTransport>,
        chat: Arc<dyn ChatTransport>,
        bus: Arc<EventBus>,
        config: NotifyConfig,
    ) -> Self {
        Self {
            settings,
            push,
            mail,
            chat,
            bus,
            config,
        }
    }

    /// Dispatcher using the real push, SMTP and Telegram transports
    pub fn with_default_transports(
        settings: Arc<SettingsStore>,
        bus: Arc<EventBus>,
        config: NotifyConfig,
    ) -> Self {
        let push = Arc::new(FcmPush::new(&config.fcm_api_base));
        let chat = Arc::new(TelegramBot::new(&config.telegram_api_base));
        Self::new(settings, push, Arc::new(SmtpMailer::new()), chat, bus, config)
    }

    /// Launch one detached delivery per deliverable channel and return
    /// immediately with the channels launched. Must be called from within a
    /// Tokio runtime.
    pub fn dispatch(&self, event: NotificationEvent) -> Vec<Channel> {
        // Settings are read once per dispatch so a concurrent update applies
        // to the next event as a whole.
        let settings = self.settings.snapshot();
        let mut launched = Vec::new();

        if settings.push.is_deliverable() {
            let transport = self.push.clone();
            let push_settings = settings.push.clone();
            let message = push_message(&event, &push_settings.device_token);
            self.launch(Channel::Push, event.id, async move {
                transport.send(&push_settings, &message).await
            });
            launched.push(Channel::Push);
        }

        if settings.email.is_deliverable() {
            let transport = self.mail.clone();
            let email_settings = settings.email.clone();
            let message = email_message(&event, &self.config.product_name);
            self.launch(Channel::Email, event.id, async move {
                transport.send(&email_settings, &message).await
            });
            launched.push(Channel::Email);
        }

        if settings.chat.is_deliverable() {
            let transport = self.chat.clone();
            let chat_settings = settings.chat.clone();
            let caption = chat_caption(&event);
            let photo = event.snapshot.clone();
            self.launch(Channel::Chat, event.id, async move {
                let photo = (!photo.is_empty()).then_some(&photo);
                transport
                    .send(&chat_settings, &caption, photo)
                    .await
                    .map(|status| status.to_string())
            });
            launched.push(Channel::Chat);
        }

        if launched.is_empty() {
            warn!("No notification channel is configured; alert {} not delivered", event.id);
        } else {
            info!("Alert {} dispatched to {:?}", event.id, launched);
        }
        launched
    }

    fn launch<F>(&self, channel: Channel, event_id: Uuid, work: F)
    where
        F: std::future::Future<Output = Result<String, NotifyError>> + Send + 'static,
    {
        let bus = self.bus.clone();
        let work = work.instrument(tracing::info_span!("alert", id = %event_id));
        let name = match channel {
            Channel::Push => "push",
            Channel::Email => "email",
            Channel::Chat => "chat",
        };

        spawn_detached(name, self.config.timeout(channel), work, move |outcome| {
            match outcome {
                TaskOutcome::Completed(detail) => bus.log(
                    LogLevel::Success,
                    format!("{} alert {} sent ({})", channel, event_id, detail),
                ),
                TaskOutcome::Failed(e) => {
                    bus.log(LogLevel::Error, format!("{} alert {} failed: {}", channel, event_id, e))
                }
                TaskOutcome::TimedOut(after) => bus.log(
                    LogLevel::Error,
                    format!("{} alert {} timed out after {:?}", channel, event_id, after),
                ),
            }
        });
    }
}
