// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Continuous frame ingestion

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use super::{Engine, FrameStatus, LogLevel};

/// Source of encoded frames for the stream worker
#[async_trait]
pub trait FrameSource: Send {
    /// Next encoded frame. `None` ends the stream; `Some(Err(_))` is a
    /// read failure the worker retries after a delay.
    async fn next_frame(&mut self) -> Option<io::Result<Vec<u8>>>;
}

/// Replays the images in a directory, in file name order
pub struct DirectoryFrameSource {
    files: Vec<PathBuf>,
    position: usize,
    looping: bool,
}

impl DirectoryFrameSource {
    const EXTENSIONS: [&'static str; 3] = ["jpg", "jpeg", "png"];

    pub fn open(dir: &Path, looping: bool) -> io::Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| Self::EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        info!("Frame source {:?}: {} images", dir, files.len());
        Ok(Self {
            files,
            position: 0,
            looping,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn next_frame(&mut self) -> Option<io::Result<Vec<u8>>> {
        if self.files.is_empty() {
            return None;
        }
        if self.position == self.files.len() {
            if !self.looping {
                return None;
            }
            self.position = 0;
        }

        let path = &self.files[self.position];
        self.position += 1;
        Some(tokio::fs::read(path).await)
    }
}

/// Counters for one stream run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub frames: u64,
    pub skipped: u64,
    pub source_errors: u64,
    pub ai_errors: u64,
    pub alert_frames: u64,
}

/// Long-lived worker feeding a [`FrameSource`] into the engine.
///
/// Fail-open: undecodable frames are skipped, inference failures are
/// logged and the loop keeps going until the source ends or shutdown is
/// signalled.
pub struct StreamWorker {
    engine: Arc<Engine>,
    config: StreamConfig,
}

impl StreamWorker {
    pub fn new(engine: Arc<Engine>, config: StreamConfig) -> Self {
        Self { engine, config }
    }

    pub async fn run<S: FrameSource>(&self, mut source: S, mut shutdown: broadcast::Receiver<()>) -> StreamStats {
        let interval = self.config.frame_interval();
        let mut stats = StreamStats::default();
        let mut pause = Duration::ZERO;

        info!("Stream worker started at {:.1} fps", self.config.fps);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Stream worker shutting down...");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }

            pause = match source.next_frame().await {
                None => {
                    info!("Frame source ended");
                    break;
                }
                Some(Err(e)) => {
                    stats.source_errors += 1;
                    warn!("Frame source error, retrying: {}", e);
                    self.config.retry_delay()
                }
                Some(Ok(bytes)) => {
                    let started = Instant::now();
                    self.handle(bytes, &mut stats).await;
                    interval.saturating_sub(started.elapsed())
                }
            };
        }

        info!(
            "Stream worker stopped: {} frames, {} skipped, {} alert frames",
            stats.frames, stats.skipped, stats.alert_frames
        );
        stats
    }

    async fn handle(&self, bytes: Vec<u8>, stats: &mut StreamStats) {
        let report = self.engine.process_frame(bytes).await;
        match report.status {
            FrameStatus::Error => {
                stats.skipped += 1;
                debug!("Skipping frame: {}", report.error.unwrap_or_default());
            }
            FrameStatus::AiError => {
                // Reported once; the cause is cached and will not change
                if stats.ai_errors == 0 {
                    self.engine.log(
                        LogLevel::Error,
                        format!("Inference unavailable, streaming without detection: {}", report.error.unwrap_or_default()),
                    );
                }
                stats.ai_errors += 1;
                stats.frames += 1;
            }
            FrameStatus::Normal | FrameStatus::FallDetected => {
                stats.frames += 1;
                if report.alert_active {
                    stats.alert_frames += 1;
                }
            }
        }
    }
}
