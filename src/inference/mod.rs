// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Inference module - lazily initialized wrapper around the pose/fall detector

mod frame;
mod remote;

pub use frame::*;
pub use remote::*;

#[cfg(test)]
pub(crate) use frame::test_png;

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{error, info};

use crate::detection::DetectionResult;

/// Inference errors. Cloneable so an initialization failure can be cached
/// and handed back to every later caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    #[error("AI model initialization failed: {0}")]
    InitFailed(String),

    #[error("Inference request failed: {0}")]
    Request(String),

    #[error("Inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid detector response: {0}")]
    InvalidResponse(String),
}

impl InferenceError {
    /// Only initialization failures disable the adapter
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::InitFailed(_))
    }
}

/// Inference configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the pose model server
    pub endpoint: String,

    /// Model identifier passed to the server
    pub model_name: String,

    /// Minimum detection score reported by the model
    pub min_score: f32,

    /// Per-frame inference timeout in milliseconds
    pub timeout_ms: u64,

    /// Timeout for the initialization health check in milliseconds
    pub init_timeout_ms: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8500".to_string(),
            model_name: "posenet_mobilenet_v1".to_string(),
            min_score: 0.45,
            timeout_ms: 2000,
            init_timeout_ms: 10_000,
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}

/// The external pose/fall model
#[async_trait]
pub trait Detector: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Run inference on one frame
    async fn detect(&self, frame: &Frame) -> Result<DetectionResult, InferenceError>;
}

/// Builds the detector on first use
#[async_trait]
pub trait DetectorFactory: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn Detector>, InferenceError>;
}

/// Lazily initialized, serialized access to a [`Detector`].
///
/// Initialization runs at most once. If it fails the error is kept and
/// returned by every later call without touching the factory again.
/// Calls into the detector are serialized by the adapter's own lock since
/// detectors are not assumed reentrant.
pub struct InferenceAdapter {
    factory: Box<dyn DetectorFactory>,
    handle: OnceCell<Result<Arc<dyn Detector>, InferenceError>>,
    inference_lock: Mutex<()>,
    timeout: Duration,
}

impl InferenceAdapter {
    pub fn new(factory: Box<dyn DetectorFactory>, timeout: Duration) -> Self {
        Self {
            factory,
            handle: OnceCell::new(),
            inference_lock: Mutex::new(()),
            timeout,
        }
    }

    /// Return the detector, initializing it on first use.
    pub async fn get_or_init(&self) -> Result<Arc<dyn Detector>, InferenceError> {
        let slot = self
            .handle
            .get_or_init(|| async {
                match self.factory.load().await {
                    Ok(detector) => {
                        info!("AI model loaded: {}", detector.name());
                        Ok(detector)
                    }
                    Err(e) => {
                        let cached = match e {
                            InferenceError::InitFailed(_) => e,
                            other => InferenceError::InitFailed(other.to_string()),
                        };
                        error!("AI model load failed, inference disabled: {}", cached);
                        Err(cached)
                    }
                }
            })
            .await;

        slot.clone()
    }

    /// Run inference on one frame.
    pub async fn process(&self, frame: &Frame) -> Result<DetectionResult, InferenceError> {
        let detector = self.get_or_init().await?;

        let _guard = self.inference_lock.lock().await;
        match tokio::time::timeout(self.timeout, detector.detect(frame)).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(self.timeout)),
        }
    }

    /// True once the detector loaded successfully
    pub fn is_ready(&self) -> bool {
        matches!(self.handle.get(), Some(Ok(_)))
    }

    /// The cached initialization error, if initialization failed
    pub fn init_error(&self) -> Option<InferenceError> {
        match self.handle.get() {
            Some(Err(e)) => Some(e.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted detectors shared by the crate's tests

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Detector that replays scripted results, then returns empty results
    pub struct ScriptedDetector {
        script: parking_lot::Mutex<VecDeque<Result<DetectionResult, InferenceError>>>,
        pub calls: AtomicUsize,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub delay: Duration,
    }

    impl ScriptedDetector {
        pub fn new(script: Vec<Result<DetectionResult, InferenceError>>) -> Self {
            Self {
                script: parking_lot::Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn push(&self, result: Result<DetectionResult, InferenceError>) {
            self.script.lock().push_back(result);
        }
    }

    #[async_trait]
    impl Detector for ScriptedDetector {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn detect(&self, _frame: &Frame) -> Result<DetectionResult, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.lock().pop_front();

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            next.unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Factory handing out a shared detector, or failing
    pub struct StaticFactory {
        pub detector: Option<Arc<ScriptedDetector>>,
        pub error: Option<InferenceError>,
        pub loads: Arc<AtomicUsize>,
    }

    impl StaticFactory {
        pub fn ok(detector: Arc<ScriptedDetector>) -> Self {
            Self {
                detector: Some(detector),
                error: None,
                loads: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                detector: None,
                error: Some(InferenceError::InitFailed(message.to_string())),
                loads: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl DetectorFactory for StaticFactory {
        async fn load(&self) -> Result<Arc<dyn Detector>, InferenceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            match (&self.detector, &self.error) {
                (Some(detector), _) => Ok(detector.clone() as Arc<dyn Detector>),
                (None, Some(e)) => Err(e.clone()),
                (None, None) => Err(InferenceError::InitFailed("no detector".to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::detection::{Detection, Label};
    use std::sync::atomic::Ordering;

    fn frame() -> Frame {
        Frame::decode(test_png(4, 4)).unwrap()
    }

    #[tokio::test]
    async fn test_lazy_init_runs_once_under_concurrency() {
        let detector = Arc::new(ScriptedDetector::new(vec![]));
        let factory = StaticFactory::ok(detector.clone());
        let loads = factory.loads.clone();
        let adapter = Arc::new(InferenceAdapter::new(Box::new(factory), Duration::from_secs(1)));

        assert!(!adapter.is_ready());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let adapter = adapter.clone();
                tokio::spawn(async move { adapter.get_or_init().await.is_ok() })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(adapter.is_ready());
    }

    #[tokio::test]
    async fn test_init_failure_is_cached() {
        let factory = StaticFactory::failing("model file missing");
        let loads = factory.loads.clone();
        let adapter = InferenceAdapter::new(Box::new(factory), Duration::from_secs(1));

        let first = adapter.process(&frame()).await.unwrap_err();
        let second = adapter.process(&frame()).await.unwrap_err();

        assert_eq!(first, InferenceError::InitFailed("model file missing".to_string()));
        assert_eq!(first, second);
        assert!(first.is_permanent());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.init_error(), Some(first));
    }

    #[tokio::test]
    async fn test_per_call_failure_does_not_disable() {
        let detector = Arc::new(ScriptedDetector::new(vec![
            Err(InferenceError::Request("bad tensor".to_string())),
            Ok(vec![Detection::new(Label::Fall, 0.7)]),
        ]));
        let adapter = InferenceAdapter::new(
            Box::new(StaticFactory::ok(detector)),
            Duration::from_secs(1),
        );

        let err = adapter.process(&frame()).await.unwrap_err();
        assert!(!err.is_permanent());

        let result = adapter.process(&frame()).await.unwrap();
        assert_eq!(result.len(), 1);
        assert!(adapter.init_error().is_none());
    }

    #[tokio::test]
    async fn test_calls_are_serialized() {
        let detector = Arc::new(ScriptedDetector::new(vec![]).with_delay(Duration::from_millis(20)));
        let adapter = Arc::new(InferenceAdapter::new(
            Box::new(StaticFactory::ok(detector.clone())),
            Duration::from_secs(5),
        ));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let adapter = adapter.clone();
                tokio::spawn(async move { adapter.process(&frame()).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(detector.calls.load(Ordering::SeqCst), 6);
        assert_eq!(detector.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_detector_times_out() {
        let detector = Arc::new(ScriptedDetector::new(vec![]).with_delay(Duration::from_millis(200)));
        let adapter = InferenceAdapter::new(
            Box::new(StaticFactory::ok(detector)),
            Duration::from_millis(20),
        );

        let err = adapter.process(&frame()).await.unwrap_err();
        assert!(matches!(err, InferenceError::Timeout(_)));
        assert!(!err.is_permanent());
    }
}
