// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Push notifications over the FCM HTTP v1 API

use std::collections::BTreeMap;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::NotifyError;
use crate::settings::PushSettings;

pub const FCM_API_BASE: &str = "https://fcm.googleapis.com";

/// A push message for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

/// Push delivery collaborator
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver one message; returns the provider's message id
    async fn send(&self, settings: &PushSettings, message: &PushMessage) -> Result<String, NotifyError>;
}

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct FcmMessage<'a> {
    token: &'a str,
    notification: FcmNotification<'a>,
    data: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct FcmRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Deserialize)]
struct FcmResponse {
    name: String,
}

/// FCM v1 client
pub struct FcmPush {
    client: Client,
    api_base: String,
}

impl FcmPush {
    pub fn new(api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for FcmPush {
    fn default() -> Self {
        Self::new(FCM_API_BASE)
    }
}

#[async_trait]
impl PushTransport for FcmPush {
    async fn send(&self, settings: &PushSettings, message: &PushMessage) -> Result<String, NotifyError> {
        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.api_base, settings.project_id
        );
        let request = FcmRequest {
            message: FcmMessage {
                token: &message.token,
                notification: FcmNotification {
                    title: &message.title,
                    body: &message.body,
                },
                data: &message.data,
            },
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&settings.access_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: FcmResponse = response.json().await?;
        Ok(parsed.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> PushSettings {
        PushSettings {
            enabled: true,
            device_token: "device-1".to_string(),
            project_id: "rehab-vision".to_string(),
            access_token: "ya29.token".to_string(),
        }
    }

    fn message() -> PushMessage {
        PushMessage {
            token: "device-1".to_string(),
            title: "URGENT: Fall Detected!".to_string(),
            body: "A fall has been detected!".to_string(),
            data: BTreeMap::from([("risk_level".to_string(), "HIGH".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_send_returns_message_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/rehab-vision/messages:send"))
            .and(header("authorization", "Bearer ya29.token"))
            .and(body_partial_json(serde_json::json!({
                "message": {"token": "device-1", "data": {"risk_level": "HIGH"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "projects/rehab-vision/messages/0:123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let push = FcmPush::new(&server.uri());
        let id = push.send(&settings(), &message()).await.unwrap();
        assert_eq!(id, "projects/rehab-vision/messages/0:123");
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("UNREGISTERED"))
            .mount(&server)
            .await;

        let push = FcmPush::new(&server.uri());
        let err = push.send(&settings(), &message()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 404, .. }));
    }
}
