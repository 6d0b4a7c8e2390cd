//! Slack Web API client

use std::fmt;

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use slack_models::{Attachment, ChatResponse, PostMessageRequest, UpdateMessageRequest};
use tracing::{debug, error};

use crate::errors::NotifierError;

/// Opaque handle of a posted message, used to address later edits
///
/// For Slack this is the message `ts`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub String);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat boundary used by the reconciler
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Post a new message and return its handle
    async fn post_message(
        &self,
        channel: &str,
        attachments: &[Attachment],
    ) -> Result<MessageHandle, NotifierError>;

    /// Replace the content of an existing message, returning the handle to
    /// use for subsequent edits
    async fn update_message(
        &self,
        channel: &str,
        handle: &MessageHandle,
        attachments: &[Attachment],
    ) -> Result<MessageHandle, NotifierError>;
}

/// Slack Web API client
pub struct SlackClient {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl SlackClient {
    /// Create a new Slack client
    pub fn new(base_url: &str, token: SecretString) -> Result<Self, NotifierError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<B: Serialize>(&self, method: &str, body: &B) -> Result<ChatResponse, NotifierError> {
        let url = format!("{}/{}", self.base_url, method);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token.expose_secret()),
            )
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Slack {} failed: {} - {}", method, status, body);
            return Err(NotifierError::SlackError(format!("{}: {} - {}", method, status, body)));
        }

        let body: ChatResponse = response.json().await?;
        check_response(method, body)
    }
}

/// Turn a Slack response envelope into a result
fn check_response(method: &str, response: ChatResponse) -> Result<ChatResponse, NotifierError> {
    if !response.ok {
        let reason = response.error.as_deref().unwrap_or("unknown_error");
        return Err(NotifierError::SlackError(format!("{}: {}", method, reason)));
    }
    if response.ts.is_none() {
        return Err(NotifierError::SlackError(format!(
            "{}: response carried no message ts",
            method
        )));
    }
    Ok(response)
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        attachments: &[Attachment],
    ) -> Result<MessageHandle, NotifierError> {
        let request = PostMessageRequest {
            channel,
            attachments,
            as_user: true,
        };
        let response = self.call("chat.postMessage", &request).await?;
        Ok(MessageHandle(response.ts.unwrap_or_default()))
    }

    async fn update_message(
        &self,
        channel: &str,
        handle: &MessageHandle,
        attachments: &[Attachment],
    ) -> Result<MessageHandle, NotifierError> {
        let request = UpdateMessageRequest {
            channel,
            ts: &handle.0,
            attachments,
            as_user: true,
        };
        let response = self.call("chat.update", &request).await?;
        Ok(MessageHandle(response.ts.unwrap_or_default()))
    }
}
