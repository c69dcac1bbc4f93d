// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! HTTP client for a pose model server

use std::sync::Arc;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Detector, DetectorFactory, Frame, InferenceConfig, InferenceError};
use crate::detection::DetectionResult;

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: DetectionResult,
}

/// Detector backed by a model server.
///
/// `POST {endpoint}/v1/detect` with the encoded frame as the body, answered
/// with `{"detections": [{"label": "FALL", "keypoints": {...}, "score": 0.9}]}`.
pub struct RemoteDetector {
    client: Client,
    endpoint: String,
    model_name: String,
    min_score: f32,
}

impl RemoteDetector {
    fn detect_url(&self) -> String {
        format!("{}/v1/detect", self.endpoint)
    }
}

#[async_trait]
impl Detector for RemoteDetector {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn detect(&self, frame: &Frame) -> Result<DetectionResult, InferenceError> {
        let threshold = self.min_score.to_string();
        let response = self
            .client
            .post(self.detect_url())
            .query(&[
                ("model", self.model_name.as_str()),
                ("threshold", threshold.as_str()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(frame.encoded().to_vec())
            .send()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Request(format!("HTTP {}: {}", status, body)));
        }

        let parsed: DetectResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;

        debug!("Model returned {} detections", parsed.detections.len());
        Ok(parsed.detections)
    }
}

/// Connects to the model server on first use. The server must answer
/// `GET {endpoint}/health` with a success status.
pub struct RemoteDetectorFactory {
    config: InferenceConfig,
}

impl RemoteDetectorFactory {
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DetectorFactory for RemoteDetectorFactory {
    async fn load(&self) -> Result<Arc<dyn Detector>, InferenceError> {
        let endpoint = self.config.endpoint.trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(InferenceError::InitFailed("no inference endpoint configured".to_string()));
        }

        let client = Client::builder()
            .timeout(self.config.timeout())
            .build()
            .map_err(|e| InferenceError::InitFailed(e.to_string()))?;

        let health = client
            .get(format!("{}/health", endpoint))
            .timeout(self.config.init_timeout())
            .send()
            .await
            .map_err(|e| InferenceError::InitFailed(format!("model server unreachable: {}", e)))?;

        if !health.status().is_success() {
            return Err(InferenceError::InitFailed(format!(
                "model server unhealthy: HTTP {}",
                health.status()
            )));
        }

        info!("Connected to model server at {}", endpoint);

        Ok(Arc::new(RemoteDetector {
            client,
            endpoint,
            model_name: self.config.model_name.clone(),
            min_score: self.config.min_score,
        }))
    }
}
