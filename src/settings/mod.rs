// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Notification channel settings
//!
//! Loaded once at startup from the settings document, the `SETTINGS_JSON`
//! environment variable and per-field environment fallbacks, then hot-swapped
//! by [`SettingsStore::update`] and rewritten to disk on every change.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Environment variable holding a complete settings document
pub const SETTINGS_ENV: &str = "SETTINGS_JSON";

pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// Push notification channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushSettings {
    pub enabled: bool,
    /// Registered device token
    pub device_token: String,
    /// Messaging project the device token belongs to
    pub project_id: String,
    /// Server credential for the messaging API
    pub access_token: String,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            device_token: String::new(),
            project_id: String::new(),
            access_token: String::new(),
        }
    }
}

impl PushSettings {
    pub fn is_deliverable(&self) -> bool {
        self.enabled
            && !self.device_token.is_empty()
            && !self.project_id.is_empty()
            && !self.access_token.is_empty()
    }
}

/// Email channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub enabled: bool,
    pub sender: String,
    pub password: String,
    pub recipient: String,
    pub smtp_server: String,
    pub smtp_port: u16,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sender: String::new(),
            password: String::new(),
            recipient: String::new(),
            smtp_server: DEFAULT_SMTP_SERVER.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
        }
    }
}

impl EmailSettings {
    pub fn is_deliverable(&self) -> bool {
        self.enabled && !self.sender.is_empty() && !self.recipient.is_empty()
    }

    pub fn server(&self) -> &str {
        if self.smtp_server.is_empty() {
            DEFAULT_SMTP_SERVER
        } else {
            &self.smtp_server
        }
    }

    pub fn port(&self) -> u16 {
        if self.smtp_port == 0 {
            DEFAULT_SMTP_PORT
        } else {
            self.smtp_port
        }
    }
}

/// Chat-bot channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: String::new(),
            chat_id: String::new(),
        }
    }
}

impl ChatSettings {
    pub fn is_deliverable(&self) -> bool {
        self.enabled && !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

/// Settings for every notification channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    #[serde(rename = "push_config")]
    pub push: PushSettings,
    #[serde(rename = "email_config")]
    pub email: EmailSettings,
    #[serde(rename = "chat_config")]
    pub chat: ChatSettings,
}

/// Partial push update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushUpdate {
    pub enabled: Option<bool>,
    pub device_token: Option<String>,
    pub project_id: Option<String>,
    /// Empty strings are ignored so a form that never echoes secrets back
    /// does not wipe them.
    pub access_token: Option<String>,
}

/// Partial email update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailUpdate {
    pub enabled: Option<bool>,
    pub sender: Option<String>,
    /// Empty strings are ignored, see [`PushUpdate::access_token`]
    pub password: Option<String>,
    pub recipient: Option<String>,
    pub smtp_server: Option<String>,
    pub smtp_port: Option<u16>,
}

/// Partial chat-bot update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatUpdate {
    pub enabled: Option<bool>,
    #[serde(alias = "telegram_token")]
    pub bot_token: Option<String>,
    #[serde(alias = "telegram_chat_id")]
    pub chat_id: Option<String>,
}

/// Partial settings update; also the shape of a stored settings document.
///
/// Documents written by earlier deployments use a top-level `fcm_token` and
/// an `sms_config` section with `telegram_token`/`telegram_chat_id`; both
/// spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    /// Device token at the top level of older documents. A
    /// `push_config.device_token` in the same document wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcm_token: Option<String>,
    #[serde(rename = "push_config")]
    pub push: Option<PushUpdate>,
    #[serde(rename = "email_config")]
    pub email: Option<EmailUpdate>,
    #[serde(rename = "chat_config", alias = "sms_config")]
    pub chat: Option<ChatUpdate>,
}

impl SettingsUpdate {
    /// Update carrying only a push device token
    pub fn device_token(token: &str) -> Self {
        Self {
            push: Some(PushUpdate {
                device_token: Some(token.to_string()),
                ..PushUpdate::default()
            }),
            ..Self::default()
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn set_secret(slot: &mut String, value: Option<String>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        *slot = v;
    }
}

impl ChannelSettings {
    /// Merge a partial update into these settings
    pub fn apply(&mut self, update: SettingsUpdate) {
        set(&mut self.push.device_token, update.fcm_token);

        if let Some(push) = update.push {
            set(&mut self.push.enabled, push.enabled);
            set(&mut self.push.device_token, push.device_token);
            set(&mut self.push.project_id, push.project_id);
            set_secret(&mut self.push.access_token, push.access_token);
        }

        if let Some(email) = update.email {
            set(&mut self.email.enabled, email.enabled);
            set(&mut self.email.sender, email.sender);
            set_secret(&mut self.email.password, email.password);
            set(&mut self.email.recipient, email.recipient);
            set(&mut self.email.smtp_server, email.smtp_server);
            set(&mut self.email.smtp_port, email.smtp_port);
        }

        if let Some(chat) = update.chat {
            set(&mut self.chat.enabled, chat.enabled);
            set(&mut self.chat.bot_token, chat.bot_token);
            set(&mut self.chat.chat_id, chat.chat_id);
        }
    }

    /// Defaults taken from per-field environment variables
    pub fn from_env<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| var(name))
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(true)
        };
        let text = |name: &str| var(name).unwrap_or_default();

        Self {
            push: PushSettings {
                enabled: flag(&["PUSH_ENABLED"]),
                device_token: text("FCM_TOKEN"),
                project_id: text("FCM_PROJECT_ID"),
                access_token: text("FCM_ACCESS_TOKEN"),
            },
            email: EmailSettings {
                enabled: flag(&["EMAIL_ENABLED"]),
                sender: text("EMAIL_SENDER"),
                password: text("EMAIL_PASSWORD"),
                recipient: text("EMAIL_RECIPIENT"),
                smtp_server: var("SMTP_SERVER").unwrap_or_else(|| DEFAULT_SMTP_SERVER.to_string()),
                smtp_port: var("SMTP_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(DEFAULT_SMTP_PORT),
            },
            chat: ChatSettings {
                enabled: flag(&["TELEGRAM_ENABLED", "SMS_ENABLED"]),
                bot_token: text("TELEGRAM_TOKEN"),
                chat_id: text("TELEGRAM_CHAT_ID"),
            },
        }
    }

    /// Masked view safe to hand to a UI
    pub fn view(&self) -> SettingsView {
        SettingsView {
            push: PushView {
                enabled: self.push.enabled,
                device_registered: !self.push.device_token.is_empty(),
                project_id: self.push.project_id.clone(),
                access_token_set: !self.push.access_token.is_empty(),
            },
            email: EmailView {
                enabled: self.email.enabled,
                sender: self.email.sender.clone(),
                recipient: self.email.recipient.clone(),
                smtp_server: self.email.smtp_server.clone(),
                smtp_port: self.email.smtp_port,
                password_set: !self.email.password.is_empty(),
            },
            chat: ChatView {
                enabled: self.chat.enabled,
                bot_token: self.chat.bot_token.clone(),
                chat_id: self.chat.chat_id.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushView {
    pub enabled: bool,
    pub device_registered: bool,
    pub project_id: String,
    pub access_token_set: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailView {
    pub enabled: bool,
    pub sender: String,
    pub recipient: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub password_set: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatView {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
}

/// Settings with secrets replaced by presence flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsView {
    #[serde(rename = "push_config")]
    pub push: PushView,
    #[serde(rename = "email_config")]
    pub email: EmailView,
    #[serde(rename = "chat_config")]
    pub chat: ChatView,
}

/// Shared, persisted channel settings
pub struct SettingsStore {
    current: RwLock<Arc<ChannelSettings>>,
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// In-memory store that never touches disk
    pub fn in_memory(settings: ChannelSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
            path: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Load settings from `path` and the process environment
    pub fn load(path: &Path) -> Self {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Load settings with an explicit environment lookup.
    ///
    /// Precedence per field: `SETTINGS_JSON` document, else the settings file,
    /// else the field's own environment variable, else the built-in default.
    pub fn load_with<F>(path: &Path, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut document = None;

        if path.exists() {
            match std::fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str::<SettingsUpdate>(&s).map_err(|e| e.to_string()))
            {
                Ok(doc) => {
                    debug!("Read settings document {:?}", path);
                    document = Some(doc);
                }
                Err(e) => warn!("Error reading settings file {:?}: {}", path, e),
            }
        }

        if let Some(raw) = var(SETTINGS_ENV) {
            match serde_json::from_str::<SettingsUpdate>(&raw) {
                Ok(doc) => {
                    info!("Loaded settings from {} environment variable", SETTINGS_ENV);
                    document = Some(doc);
                }
                Err(e) => error!("Failed to parse {}: {}", SETTINGS_ENV, e),
            }
        }

        let mut settings = ChannelSettings::from_env(&var);
        if let Some(doc) = document {
            settings.apply(doc);
        }

        info!("Notification settings loaded");
        Self {
            current: RwLock::new(Arc::new(settings)),
            path: Some(path.to_path_buf()),
            write_lock: Mutex::new(()),
        }
    }

    /// Current settings. Cheap; readers never block updates for long.
    pub fn snapshot(&self) -> Arc<ChannelSettings> {
        self.current.read().clone()
    }

    pub fn view(&self) -> SettingsView {
        self.snapshot().view()
    }

    /// Merge `update`, swap it in and persist. Persistence failures are
    /// logged; the new in-memory settings stay in effect regardless.
    ///
    /// Writes the settings file; async callers run this on the blocking pool.
    /// Readers of [`snapshot`](Self::snapshot) are not held up by the write.
    pub fn update(&self, update: SettingsUpdate) -> Arc<ChannelSettings> {
        let _write = self.write_lock.lock();

        let mut next = (*self.snapshot()).clone();
        next.apply(update);
        let next = Arc::new(next);
        *self.current.write() = next.clone();

        self.persist(&next);
        next
    }

    fn persist(&self, settings: &ChannelSettings) {
        let Some(path) = &self.path else {
            return;
        };

        let result = serde_json::to_string_pretty(settings)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                std::fs::write(path, content).map_err(|e| e.to_string())
            });

        match result {
            Ok(()) => debug!("Settings saved to {:?}", path),
            Err(e) => error!("Failed to save settings to {:?}: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn full_settings() -> ChannelSettings {
        ChannelSettings {
            push: PushSettings {
                enabled: true,
                device_token: "device-1".to_string(),
                project_id: "rehab-vision".to_string(),
                access_token: "ya29.secret".to_string(),
            },
            email: EmailSettings {
                enabled: true,
                sender: "cam@example.com".to_string(),
                password: "hunter2".to_string(),
                recipient: "family@example.com".to_string(),
                smtp_server: "smtp.example.com".to_string(),
                smtp_port: 587,
            },
            chat: ChatSettings {
                enabled: false,
                bot_token: "123:abc".to_string(),
                chat_id: "-1001".to_string(),
            },
        }
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::load_with(&path, no_env);
        let full = full_settings();
        store.update(SettingsUpdate {
            push: Some(PushUpdate {
                enabled: Some(full.push.enabled),
                device_token: Some(full.push.device_token.clone()),
                project_id: Some(full.push.project_id.clone()),
                access_token: Some(full.push.access_token.clone()),
            }),
            email: Some(EmailUpdate {
                enabled: Some(full.email.enabled),
                sender: Some(full.email.sender.clone()),
                password: Some(full.email.password.clone()),
                recipient: Some(full.email.recipient.clone()),
                smtp_server: Some(full.email.smtp_server.clone()),
                smtp_port: Some(full.email.smtp_port),
            }),
            chat: Some(ChatUpdate {
                enabled: Some(full.chat.enabled),
                bot_token: Some(full.chat.bot_token.clone()),
                chat_id: Some(full.chat.chat_id.clone()),
            }),
            ..SettingsUpdate::default()
        });

        let reloaded = SettingsStore::load_with(&path, no_env);
        assert_eq!(*reloaded.snapshot(), full);
    }

    #[test]
    fn test_omitted_credential_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::load_with(&path, no_env);
        store.update(SettingsUpdate {
            email: Some(EmailUpdate {
                sender: Some("cam@example.com".to_string()),
                password: Some("hunter2".to_string()),
                ..EmailUpdate::default()
            }),
            ..SettingsUpdate::default()
        });

        // Password omitted, then sent back empty
        store.update(SettingsUpdate {
            email: Some(EmailUpdate {
                recipient: Some("family@example.com".to_string()),
                ..EmailUpdate::default()
            }),
            ..SettingsUpdate::default()
        });
        store.update(SettingsUpdate {
            email: Some(EmailUpdate {
                password: Some(String::new()),
                ..EmailUpdate::default()
            }),
            ..SettingsUpdate::default()
        });

        let reloaded = SettingsStore::load_with(&path, no_env).snapshot();
        assert_eq!(reloaded.email.password, "hunter2");
        assert_eq!(reloaded.email.sender, "cam@example.com");
        assert_eq!(reloaded.email.recipient, "family@example.com");
    }

    #[test]
    fn test_disable_channel_keeps_credentials() {
        let store = SettingsStore::in_memory(full_settings());
        let updated = store.update(SettingsUpdate {
            push: Some(PushUpdate {
                enabled: Some(false),
                ..PushUpdate::default()
            }),
            ..SettingsUpdate::default()
        });

        assert!(!updated.push.enabled);
        assert!(!updated.push.is_deliverable());
        assert_eq!(updated.push.device_token, "device-1");
        assert!(updated.email.is_deliverable());
    }

    #[test]
    fn test_env_fallbacks() {
        let env: HashMap<&str, &str> = [
            ("EMAIL_SENDER", "env@example.com"),
            ("SMTP_PORT", "587"),
            ("TELEGRAM_ENABLED", "false"),
        ]
        .into_iter()
        .collect();
        let dir = tempfile::tempdir().unwrap();

        let store = SettingsStore::load_with(&dir.path().join("missing.json"), |k| {
            env.get(k).map(|v| v.to_string())
        });
        let settings = store.snapshot();

        assert_eq!(settings.email.sender, "env@example.com");
        assert_eq!(settings.email.smtp_port, 587);
        assert_eq!(settings.email.smtp_server, DEFAULT_SMTP_SERVER);
        assert!(!settings.chat.enabled);
        assert!(settings.push.enabled);
    }

    #[test]
    fn test_env_document_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"chat_config": {"bot_token": "from-file", "chat_id": "1"}}"#).unwrap();

        let doc = r#"{"chat_config": {"bot_token": "from-env"}}"#.to_string();
        let store = SettingsStore::load_with(&path, |k| (k == SETTINGS_ENV).then(|| doc.clone()));

        assert_eq!(store.snapshot().chat.bot_token, "from-env");
        assert_eq!(store.snapshot().chat.chat_id, "");
    }

    #[test]
    fn test_legacy_document_shape() {
        let doc = r#"{
            "fcm_token": "device-legacy",
            "email_config": {"enabled": true, "sender": "cam@example.com", "recipient": "family@example.com"},
            "sms_config": {
                "enabled": false,
                "provider": "telegram",
                "telegram_token": "123:abc",
                "telegram_chat_id": "-1001"
            }
        }"#
        .to_string();
        let dir = tempfile::tempdir().unwrap();

        let store = SettingsStore::load_with(&dir.path().join("settings.json"), |k| {
            (k == SETTINGS_ENV).then(|| doc.clone())
        });
        let settings = store.snapshot();

        assert_eq!(settings.push.device_token, "device-legacy");
        assert_eq!(settings.email.sender, "cam@example.com");
        assert_eq!(settings.chat.bot_token, "123:abc");
        assert_eq!(settings.chat.chat_id, "-1001");
        assert!(!settings.chat.enabled);
    }

    #[test]
    fn test_push_config_token_beats_top_level() {
        let update: SettingsUpdate = serde_json::from_str(
            r#"{"fcm_token": "old", "push_config": {"device_token": "new"}}"#,
        )
        .unwrap();
        let mut settings = ChannelSettings::default();
        settings.apply(update);
        assert_eq!(settings.push.device_token, "new");
    }

    #[test]
    fn test_sms_enabled_env_fallback() {
        let settings = ChannelSettings::from_env(|k| (k == "SMS_ENABLED").then(|| "False".to_string()));
        assert!(!settings.chat.enabled);
        assert!(settings.email.enabled);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::load_with(&path, no_env);
        assert_eq!(*store.snapshot(), ChannelSettings::default());
    }

    #[test]
    fn test_unwritable_path_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every write fail
        let path = dir.path().join("settings.json");
        std::fs::create_dir(&path).unwrap();

        let store = SettingsStore::load_with(&path, no_env);
        let updated = store.update(SettingsUpdate::device_token("device-9"));

        assert_eq!(updated.push.device_token, "device-9");
        assert_eq!(store.snapshot().push.device_token, "device-9");
    }

    #[test]
    fn test_view_masks_secrets() {
        let view = full_settings().view();
        let json = serde_json::to_string(&view).unwrap();

        assert!(view.email.password_set);
        assert!(view.push.access_token_set);
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("ya29.secret"));
    }
}
