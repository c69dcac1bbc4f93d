// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Event history - bounded, newest-first log of confirmed fall events

use std::path::{Path, PathBuf};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

pub const EVENT_TYPE_FALL: &str = "Fall Detected";
pub const STATUS_CONFIRMED: &str = "CONFIRMED";
pub const CONFIDENCE_HIGH: &str = "HIGH";

/// One persisted fall event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unix time in milliseconds when the event was recorded
    pub id: i64,
    /// Local wall-clock time, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub status: String,
    pub confidence: String,
    pub location: String,
}

impl EventRecord {
    /// Confirmed fall event recorded at `at`
    pub fn fall(at: DateTime<Local>, location: &str) -> Self {
        Self {
            id: at.timestamp_millis(),
            timestamp: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            event_type: EVENT_TYPE_FALL.to_string(),
            status: STATUS_CONFIRMED.to_string(),
            confidence: CONFIDENCE_HIGH.to_string(),
            location: location.to_string(),
        }
    }
}

/// Event history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// History document path, relative to the data directory
    pub path: PathBuf,

    /// Maximum number of events kept
    pub max_events: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(crate::config::HISTORY_FILE),
            max_events: 50,
        }
    }
}

/// Bounded event history backed by a JSON document.
///
/// One lock covers the whole read-modify-persist sequence, so mutating
/// calls do file I/O and belong on the blocking pool when made from async
/// code. Disk failures are logged and swallowed; the in-memory list stays
/// authoritative.
pub struct EventStore {
    events: Mutex<Vec<EventRecord>>,
    path: Option<PathBuf>,
    max_events: usize,
}

impl EventStore {
    /// Open the history at `config.path`, starting empty if it is missing or
    /// unreadable.
    pub fn open(config: &HistoryConfig) -> Self {
        let mut events = Self::read(&config.path);
        events.truncate(config.max_events);
        info!("Event history opened at {:?} ({} events)", config.path, events.len());

        Self {
            events: Mutex::new(events),
            path: Some(config.path.clone()),
            max_events: config.max_events,
        }
    }

    pub fn in_memory(max_events: usize) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            path: None,
            max_events,
        }
    }

    fn read(path: &Path) -> Vec<EventRecord> {
        if !path.exists() {
            return Vec::new();
        }

        match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
        {
            Ok(events) => events,
            Err(e) => {
                warn!("Unreadable event history {:?}, starting empty: {}", path, e);
                Vec::new()
            }
        }
    }

    /// Insert `record` at the front, evicting the oldest beyond the cap
    pub fn append(&self, record: EventRecord) {
        let mut events = self.events.lock();
        events.insert(0, record);
        events.truncate(self.max_events);
        self.persist(&events);
    }

    /// All events, newest first
    pub fn list(&self) -> Vec<EventRecord> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut events = self.events.lock();
        events.clear();
        self.persist(&events);
        info!("Event history cleared");
    }

    fn persist(&self, events: &[EventRecord]) {
        let Some(path) = &self.path else {
            return;
        };

        let result = serde_json::to_string_pretty(events)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                std::fs::write(path, content).map_err(|e| e.to_string())
            });

        match result {
            Ok(()) => debug!("Event history written to {:?}", path),
            Err(e) => error!("Failed to write event history {:?}: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn record(n: i64) -> EventRecord {
        let at = Local.timestamp_millis_opt(1_700_000_000_000 + n * 1000).unwrap();
        EventRecord::fall(at, "Living Room")
    }

    #[test]
    fn test_record_defaults() {
        let at = Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let event = EventRecord::fall(at, "Bedroom");

        assert_eq!(event.id, at.timestamp_millis());
        assert_eq!(event.timestamp, "2026-03-14 09:26:53");
        assert_eq!(event.event_type, "Fall Detected");
        assert_eq!(event.status, "CONFIRMED");
        assert_eq!(event.confidence, "HIGH");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Fall Detected");
    }

    #[test]
    fn test_newest_first() {
        let store = EventStore::in_memory(50);
        store.append(record(1));
        store.append(record(2));
        store.append(record(3));

        let ids: Vec<_> = store.list().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![record(3).id, record(2).id, record(1).id]);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let store = EventStore::in_memory(5);
        for n in 0..8 {
            store.append(record(n));
            assert!(store.len() <= 5);
        }

        let list = store.list();
        assert_eq!(list.len(), 5);
        assert_eq!(list.first().unwrap().id, record(7).id);
        assert_eq!(list.last().unwrap().id, record(3).id);
    }

    #[test]
    fn test_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let config = HistoryConfig {
            path: dir.path().join("events.json"),
            max_events: 50,
        };

        let store = EventStore::open(&config);
        store.append(record(1));
        store.append(record(2));

        let reopened = EventStore::open(&config);
        assert_eq!(reopened.list(), store.list());

        reopened.clear();
        assert!(EventStore::open(&config).is_empty());
    }

    #[test]
    fn test_reload_respects_smaller_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        let store = EventStore::open(&HistoryConfig { path: path.clone(), max_events: 10 });
        for n in 0..10 {
            store.append(record(n));
        }

        let smaller = EventStore::open(&HistoryConfig { path, max_events: 3 });
        assert_eq!(smaller.len(), 3);
        assert_eq!(smaller.list()[0].id, record(9).id);
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::create_dir(&path).unwrap();

        let store = EventStore::open(&HistoryConfig { path, max_events: 50 });
        store.append(record(1));

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_appends_stay_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let config = HistoryConfig {
            path: dir.path().join("events.json"),
            max_events: 20,
        };
        let store = Arc::new(EventStore::open(&config));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for n in 0..10 {
                        store.append(record(t * 100 + n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 20);
        assert_eq!(EventStore::open(&config).list(), store.list());
    }
}
