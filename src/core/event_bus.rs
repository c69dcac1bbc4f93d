// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Event bus for pipeline events and the operator-facing system log

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Number of system log entries kept for the UI
pub const SYSTEM_LOG_CAPACITY: usize = 100;

/// Severity of a system log entry, as shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Alert,
    Error,
    Success,
}

/// One system log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Local time, `%H:%M:%S`
    pub time: String,
    pub message: String,
    #[serde(rename = "type")]
    pub level: LogLevel,
}

/// Event types in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    AlertRaised,
    AlertReset,
    SettingsChanged,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    AlertRaised { notification_id: Uuid },
    AlertReset,
    SettingsChanged,
    Log(LogEntry),
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

/// Central event bus for pub/sub communication
pub struct EventBus {
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
    logs: Mutex<VecDeque<LogEntry>>,
    log_capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            event_tx,
            event_counter: AtomicU64::new(0),
            logs: Mutex::new(VecDeque::with_capacity(SYSTEM_LOG_CAPACITY)),
            log_capacity: SYSTEM_LOG_CAPACITY,
        }
    }

    pub fn publish_alert(&self, notification_id: Uuid) {
        self.publish_event(EventType::AlertRaised, EventPayload::AlertRaised { notification_id });
    }

    pub fn publish_reset(&self) {
        self.publish_event(EventType::AlertReset, EventPayload::AlertReset);
    }

    pub fn publish_settings_changed(&self) {
        self.publish_event(EventType::SettingsChanged, EventPayload::SettingsChanged);
    }

    /// Record an operator-facing log line. Also emitted through `tracing`.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Error => error!("{}", message),
            LogLevel::Alert => warn!("{}", message),
            LogLevel::Info | LogLevel::Success => info!("{}", message),
        }

        let entry = LogEntry {
            time: Local::now().format("%H:%M:%S").to_string(),
            message,
            level,
        };

        {
            let mut logs = self.logs.lock();
            if logs.len() == self.log_capacity {
                logs.pop_front();
            }
            logs.push_back(entry.clone());
        }

        self.publish_event(EventType::Log, EventPayload::Log(entry));
    }

    /// Buffered system log, oldest first
    pub fn system_logs(&self) -> Vec<LogEntry> {
        self.logs.lock().iter().cloned().collect()
    }

    fn publish_event(&self, event_type: EventType, payload: EventPayload) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            event_type,
            timestamp: Utc::now(),
            payload,
        };
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
