//! Server state

use std::sync::Arc;

use chrono::Utc;
use http::HeaderMap;
use secrecy::SecretString;

use crate::errors::NotifierError;
use crate::nomad::client::DeploymentActions;
use crate::server::signature::{verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Server state shared across handlers
pub struct ServerState {
    pub deployments: Arc<dyn DeploymentActions>,
    signing_secret: SecretString,
}

impl ServerState {
    pub fn new(deployments: Arc<dyn DeploymentActions>, signing_secret: SecretString) -> Self {
        Self {
            deployments,
            signing_secret,
        }
    }

    /// Check that a request was signed by Slack within the replay window
    pub fn verify_request(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), NotifierError> {
        let timestamp = header(headers, TIMESTAMP_HEADER)?;
        let signature = header(headers, SIGNATURE_HEADER)?;
        verify_signature(
            &self.signing_secret,
            timestamp,
            body,
            signature,
            Utc::now().timestamp(),
        )
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, NotifierError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| NotifierError::SignatureError(format!("missing {} header", name)))
}
