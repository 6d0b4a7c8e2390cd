//! Application configuration options

use std::time::Duration;

use secrecy::SecretString;

use crate::errors::NotifierError;
use crate::settings::Settings;
use crate::workers::event_stream;

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Slack configuration
    pub slack: SlackOptions,

    /// Nomad configuration
    pub nomad: NomadOptions,

    /// Enable the interactive action server
    pub enable_action_server: bool,

    /// Action server configuration
    pub server: ServerOptions,

    /// Event stream worker options
    pub event_stream: event_stream::Options,
}

impl AppOptions {
    /// Build options from validated settings
    pub fn from_settings(settings: Settings) -> Result<Self, NotifierError> {
        settings.validate()?;

        let ui_base_url = settings.nomad.ui_base_url().to_string();
        let token = settings
            .slack
            .token
            .ok_or_else(|| NotifierError::ConfigError("no Slack token provided".to_string()))?;

        Ok(Self {
            lifecycle: LifecycleOptions::default(),
            slack: SlackOptions {
                api_base_url: settings.slack.api_base_url,
                token,
                channel: settings.slack.channel,
                signing_secret: settings.slack.signing_secret,
            },
            nomad: NomadOptions {
                address: settings.nomad.address,
                token: settings.nomad.token,
                ui_base_url,
            },
            enable_action_server: settings.action_server.enabled,
            server: ServerOptions {
                host: settings.action_server.host,
                port: settings.action_server.port,
            },
            event_stream: event_stream::Options::default(),
        })
    }
}

/// Lifecycle options for the notifier
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Slack options
#[derive(Debug)]
pub struct SlackOptions {
    /// Web API base URL
    pub api_base_url: String,

    /// Bot token
    pub token: SecretString,

    /// Channel deployment messages go to
    pub channel: String,

    /// Signing secret for interactive requests
    pub signing_secret: Option<SecretString>,
}

/// Nomad options
#[derive(Debug)]
pub struct NomadOptions {
    /// HTTP API address
    pub address: String,

    /// ACL token
    pub token: Option<SecretString>,

    /// UI address used in message links
    pub ui_base_url: String,
}

/// Action server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}
