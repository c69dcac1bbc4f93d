// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Core engine module - wires inference, the alert latch, the cooldown gate,
//! the event history and the notification dispatcher into one pipeline

mod clock;
mod engine;
mod scheduler;
mod event_bus;

pub use clock::{Clock, SystemClock};
pub use engine::{Engine, EngineParts};
pub use scheduler::{DirectoryFrameSource, FrameSource, StreamStats, StreamWorker};
pub use event_bus::*;

#[cfg(test)]
pub(crate) use clock::ManualClock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::Detection;

/// Result of one pipeline stage. The caller decides what a failure means
/// for its own path.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Ok(T),
    /// The stage failed for this frame only
    Recoverable(String),
    /// The stage cannot succeed until the process is reconfigured
    Fatal(String),
}

impl<T> StageOutcome<T> {
    /// Continue with `fallback` on a recoverable failure
    pub fn fail_open(self, fallback: T) -> Result<T, String> {
        match self {
            StageOutcome::Ok(value) => Ok(value),
            StageOutcome::Recoverable(_) => Ok(fallback),
            StageOutcome::Fatal(e) => Err(e),
        }
    }
}

/// Per-frame status reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameStatus {
    Normal,
    FallDetected,
    AiError,
    Error,
}

/// Result of processing one discrete frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub status: FrameStatus,
    pub detections: Vec<Detection>,
    pub alert_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameReport {
    pub fn failed(status: FrameStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            detections: Vec::new(),
            alert_active: false,
            error: Some(error.into()),
        }
    }
}

/// Pipeline health
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub running: bool,
    pub ai_ready: bool,
    pub ai_error: Option<String>,
    pub alert_active: bool,
    pub frames_processed: u64,
    pub alerts_sent: u64,
}

/// Rejected requests from the upward API
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("Invalid location: {lat}, {lng}")]
    InvalidLocation { lat: f64, lng: f64 },

    #[error("No token provided")]
    EmptyToken,
}
