// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Alert latch - turns a momentary fall detection into a sustained warning

use std::time::{Duration, Instant};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{contains_fall, Detection};

/// Phase of the process-wide alert state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertPhase {
    Idle,
    Latched,
}

/// Raw alert state. The phase is never stored; it is derived from the
/// expiry on every read.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertState {
    /// `None` means the latch has never fired or was reset.
    pub latch_expiry: Option<Instant>,
}

impl AlertState {
    pub fn phase_at(&self, now: Instant) -> AlertPhase {
        match self.latch_expiry {
            Some(expiry) if now < expiry => AlertPhase::Latched,
            _ => AlertPhase::Idle,
        }
    }
}

/// Outcome of feeding a fall detection into the latch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchTransition {
    /// The latch was idle and is now latched
    Entered,
    /// The latch was already latched; the expiry was extended
    Extended,
}

/// Process-wide alert latch
pub struct AlertLatch {
    state: Mutex<AlertState>,
    window: Duration,
}

impl AlertLatch {
    pub fn new(window: Duration) -> Self {
        Self {
            state: Mutex::new(AlertState::default()),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a fall detection observed at `now`.
    ///
    /// The expiry moves to `now + window` but never backwards. Only
    /// [`LatchTransition::Entered`] should drive notifications.
    pub fn trigger(&self, now: Instant) -> LatchTransition {
        let mut state = self.state.lock();
        let was = state.phase_at(now);

        let candidate = now + self.window;
        state.latch_expiry = Some(match state.latch_expiry {
            Some(expiry) if expiry > candidate => expiry,
            _ => candidate,
        });

        match was {
            AlertPhase::Idle => {
                debug!("Alert latch entered, expires in {:?}", self.window);
                LatchTransition::Entered
            }
            AlertPhase::Latched => LatchTransition::Extended,
        }
    }

    /// Feed one frame's detections. Returns true only when this call moved
    /// the latch from `Idle` to `Latched`.
    pub fn observe(&self, detections: &[Detection], now: Instant) -> bool {
        contains_fall(detections) && self.trigger(now) == LatchTransition::Entered
    }

    /// Clear the latch unconditionally. A fall processed after this call
    /// latches again.
    pub fn reset(&self) {
        self.state.lock().latch_expiry = None;
    }

    pub fn phase_at(&self, now: Instant) -> AlertPhase {
        self.state.lock().phase_at(now)
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.phase_at(now) == AlertPhase::Latched
    }

    pub fn snapshot(&self) -> AlertState {
        *self.state.lock()
    }
}
