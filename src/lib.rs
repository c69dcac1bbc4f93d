// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! FallWatch - Real-Time Fall Detection Alert Pipeline
//!
//! Watches a video stream for falls, holds a short-lived alert so a single
//! detection becomes a sustained warning, and fans each alert out to push,
//! email and chat-bot channels without letting a slow channel touch the
//! video path.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        FallWatch Engine                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌───────┐   ┌──────────┐     │
//! │  │  Stream  │ → │ Inference │ → │ Alert │ → │ Cooldown │     │
//! │  │  Worker  │   │  Adapter  │   │ Latch │   │   Gate   │     │
//! │  └──────────┘   └───────────┘   └───────┘   └──────────┘     │
//! │  process_frame ───↗                              ↓           │
//! │                                 ┌──────────┐  ┌────────────┐ │
//! │                                 │  Event   │  │ Dispatcher │ │
//! │                                 │  Store   │  │ push/mail/ │ │
//! │                                 │          │  │    chat    │ │
//! │                                 └──────────┘  └────────────┘ │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              Event Bus / System Log                    │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod core;
pub mod detection;
pub mod inference;
pub mod notify;
pub mod settings;
pub mod config;
pub mod db;

// Re-exports for convenience
pub use config::Config;
pub use crate::core::{Engine, EventBus, FrameReport, FrameStatus, StreamWorker};
pub use detection::{AlertLatch, CooldownGate, Detection, Label};
pub use inference::{InferenceAdapter, InferenceError};
pub use notify::NotificationDispatcher;
pub use settings::SettingsStore;
pub use db::{EventRecord, EventStore};

/// FallWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// FallWatch name
pub const NAME: &str = "FallWatch";
