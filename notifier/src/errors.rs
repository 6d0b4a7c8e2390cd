//! Error types for the notifier

use thiserror::Error;

/// Main error type for the notifier
#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Slack error: {0}")]
    SlackError(String),

    #[error("Nomad error: {0}")]
    NomadError(String),

    #[error("Event stream error: {0}")]
    StreamError(String),

    #[error("Signature error: {0}")]
    SignatureError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for NotifierError {
    fn from(err: anyhow::Error) -> Self {
        NotifierError::Internal(err.to_string())
    }
}
