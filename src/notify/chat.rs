// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Chat-bot alerts over the Telegram Bot API

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use super::{NotifyError, Snapshot};
use crate::settings::ChatSettings;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Chat-bot delivery collaborator
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post `caption`, with `photo` when available; returns the HTTP status
    async fn send(
        &self,
        settings: &ChatSettings,
        caption: &str,
        photo: Option<&Snapshot>,
    ) -> Result<u16, NotifyError>;
}

/// Telegram bot client
pub struct TelegramBot {
    client: Client,
    api_base: String,
}

impl TelegramBot {
    pub fn new(api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, token, method)
    }
}

impl Default for TelegramBot {
    fn default() -> Self {
        Self::new(TELEGRAM_API_BASE)
    }
}

#[async_trait]
impl ChatTransport for TelegramBot {
    async fn send(
        &self,
        settings: &ChatSettings,
        caption: &str,
        photo: Option<&Snapshot>,
    ) -> Result<u16, NotifyError> {
        let request = match photo.filter(|p| !p.bytes.is_empty()) {
            Some(photo) => {
                let part = Part::bytes(photo.bytes.to_vec())
                    .file_name(photo.file_name("capture"))
                    .mime_str(photo.mime)
                    .map_err(|e| NotifyError::Payload(e.to_string()))?;
                let form = Form::new()
                    .text("chat_id", settings.chat_id.clone())
                    .text("caption", caption.to_string())
                    .text("parse_mode", "Markdown")
                    .part("photo", part);

                self.client
                    .post(self.method_url(&settings.bot_token, "sendPhoto"))
                    .multipart(form)
            }
            None => self
                .client
                .post(self.method_url(&settings.bot_token, "sendMessage"))
                .form(&[
                    ("chat_id", settings.chat_id.as_str()),
                    ("text", caption),
                    ("parse_mode", "Markdown"),
                ]),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Telegram accepted alert ({})", status);
        Ok(status.as_u16())
    }
}
