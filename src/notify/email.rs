// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Email alerts over SMTP

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{NotifyError, Snapshot};
use crate::settings::EmailSettings;

/// Port that uses STARTTLS; every other port uses implicit TLS
pub const STARTTLS_PORT: u16 = 587;

/// An alert email
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    pub attachment: Option<Snapshot>,
}

/// Email delivery collaborator
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver one message; returns the server's reply code
    async fn send(&self, settings: &EmailSettings, message: &EmailMessage) -> Result<String, NotifyError>;
}

/// SMTP mailer. A new connection is opened per alert since alerts are rare.
#[derive(Debug, Default)]
pub struct SmtpMailer;

impl SmtpMailer {
    pub fn new() -> Self {
        Self
    }

    fn build(settings: &EmailSettings, message: &EmailMessage) -> Result<Message, NotifyError> {
        let from: Mailbox = settings
            .sender
            .parse()
            .map_err(|e| NotifyError::InvalidConfig(format!("sender: {}", e)))?;
        let to: Mailbox = settings
            .recipient
            .parse()
            .map_err(|e| NotifyError::InvalidConfig(format!("recipient: {}", e)))?;

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(message.body.clone()));
        if let Some(snapshot) = &message.attachment {
            let content_type = ContentType::parse(snapshot.mime)
                .map_err(|e| NotifyError::Payload(e.to_string()))?;
            parts = parts.singlepart(
                Attachment::new(snapshot.file_name("fall_snapshot"))
                    .body(snapshot.bytes.to_vec(), content_type),
            );
        }

        Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone())
            .multipart(parts)
            .map_err(|e| NotifyError::Payload(e.to_string()))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, settings: &EmailSettings, message: &EmailMessage) -> Result<String, NotifyError> {
        let email = Self::build(settings, message)?;
        let host = settings.server();
        let port = settings.port();

        let builder = if port == STARTTLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        }
        .map_err(|e| NotifyError::Transport(e.to_string()))?
        .port(port);

        let builder = if settings.password.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                settings.sender.clone(),
                settings.password.clone(),
            ))
        };

        debug!("Sending alert email via {}:{}", host, port);
        let response = builder
            .build()
            .send(email)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(response.code().to_string())
    }
}
