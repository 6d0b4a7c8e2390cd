//! Notifier settings
//!
//! Settings are read from an optional JSON file and then overridden by
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::errors::NotifierError;
use crate::logs::LogLevel;

/// Notifier settings
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON formatted logs
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rotated log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Slack configuration
    #[serde(default)]
    pub slack: SlackSettings,

    /// Nomad configuration
    #[serde(default)]
    pub nomad: NomadSettings,

    /// Interactive action server configuration
    #[serde(default)]
    pub action_server: ActionServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            slack: SlackSettings::default(),
            nomad: NomadSettings::default(),
            action_server: ActionServerSettings::default(),
        }
    }
}

/// Slack settings
#[derive(Debug, Deserialize)]
pub struct SlackSettings {
    /// Bot token used for `chat.postMessage` and `chat.update`
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub token: Option<SecretString>,

    /// Channel deployment messages are posted to
    #[serde(default)]
    pub channel: String,

    /// Signing secret used to verify interactive requests
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub signing_secret: Option<SecretString>,

    /// Slack Web API base URL
    #[serde(default = "default_slack_api_url")]
    pub api_base_url: String,
}

fn default_slack_api_url() -> String {
    "https://slack.com/api".to_string()
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            token: None,
            channel: String::new(),
            signing_secret: None,
            api_base_url: default_slack_api_url(),
        }
    }
}

/// Nomad settings
#[derive(Debug, Deserialize)]
pub struct NomadSettings {
    /// Nomad HTTP API address
    #[serde(default = "default_nomad_address")]
    pub address: String,

    /// ACL token sent as `X-Nomad-Token`
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub token: Option<SecretString>,

    /// Address of the Nomad UI used in message links
    #[serde(default)]
    pub external_url: Option<String>,
}

fn default_nomad_address() -> String {
    "http://127.0.0.1:4646".to_string()
}

impl Default for NomadSettings {
    fn default() -> Self {
        Self {
            address: default_nomad_address(),
            token: None,
            external_url: None,
        }
    }
}

impl NomadSettings {
    /// UI base URL for deep links, falling back to the API address
    pub fn ui_base_url(&self) -> &str {
        match self.external_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => &self.address,
        }
    }

    pub fn has_external_url(&self) -> bool {
        self.external_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

/// Interactive action server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ActionServerSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_action_host")]
    pub host: String,

    #[serde(default = "default_action_port")]
    pub port: u16,
}

fn default_action_host() -> String {
    "0.0.0.0".to_string()
}

fn default_action_port() -> u16 {
    8080
}

impl Default for ActionServerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_action_host(),
            port: default_action_port(),
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

impl Settings {
    /// Load settings from an optional JSON file and the process environment
    pub async fn load(config_file: Option<&Path>) -> Result<Self, NotifierError> {
        let mut settings = match config_file {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading settings file {}", path.display()))?;
                serde_json::from_str::<Settings>(&raw)?
            }
            None => Settings::default(),
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Override settings from environment variables resolved by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), NotifierError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level.parse().map_err(NotifierError::ConfigError)?;
        }
        if let Some(json) = var("LOG_JSON") {
            self.log_json = parse_bool("LOG_JSON", &json)?;
        }
        if let Some(dir) = var("LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }

        if let Some(token) = var("SLACK_TOKEN") {
            self.slack.token = Some(SecretString::from(token));
        }
        if let Some(channel) = var("SLACK_CHANNEL") {
            self.slack.channel = channel;
        }
        if let Some(secret) = var("SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = Some(SecretString::from(secret));
        }

        if let Some(address) = var("NOMAD_ADDR") {
            self.nomad.address = address;
        }
        if let Some(token) = var("NOMAD_TOKEN") {
            self.nomad.token = Some(SecretString::from(token));
        }
        if let Some(url) = var("NOMAD_SERVER_EXTERNAL_URL") {
            self.nomad.external_url = Some(url);
        }

        if let Some(enabled) = var("ENABLE_ACTION_SERVER") {
            self.action_server.enabled = parse_bool("ENABLE_ACTION_SERVER", &enabled)?;
        }
        if let Some(host) = var("ACTION_SERVER_HOST") {
            self.action_server.host = host;
        }
        if let Some(port) = var("ACTION_SERVER_PORT") {
            self.action_server.port = port.parse().map_err(|_| {
                NotifierError::ConfigError(format!("Invalid ACTION_SERVER_PORT: {}", port))
            })?;
        }

        Ok(())
    }

    /// Check the settings required to start
    pub fn validate(&self) -> Result<(), NotifierError> {
        match &self.slack.token {
            Some(token) if !token.expose_secret().is_empty() => {}
            _ => {
                return Err(NotifierError::ConfigError(
                    "no Slack token provided (SLACK_TOKEN)".to_string(),
                ))
            }
        }
        if self.slack.channel.is_empty() {
            return Err(NotifierError::ConfigError(
                "no Slack channel provided (SLACK_CHANNEL)".to_string(),
            ));
        }
        if self.action_server.enabled && self.slack.signing_secret.is_none() {
            return Err(NotifierError::ConfigError(
                "action server requires a Slack signing secret (SLACK_SIGNING_SECRET)".to_string(),
            ));
        }
        url::Url::parse(&self.nomad.address)?;
        url::Url::parse(self.nomad.ui_base_url())?;
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, NotifierError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(NotifierError::ConfigError(format!(
            "Invalid boolean for {}: {}",
            key, value
        ))),
    }
}
