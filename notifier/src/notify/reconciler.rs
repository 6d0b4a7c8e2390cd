//! Deployment to message reconciliation
//!
//! Keeps exactly one Slack message per deployment: the first snapshot of a
//! deployment posts a message, later snapshots edit it in place.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use nomad_models::Deployment;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::NotifierError;
use crate::notify::render::render;
use crate::slack::client::{ChatApi, MessageHandle};
use crate::workers::event_stream::DeploymentConsumer;

/// Upserts one chat message per deployment
pub struct Reconciler {
    chat: Arc<dyn ChatApi>,
    channel: String,
    ui_base_url: String,
    // Held across the chat call so two snapshots of one deployment can never
    // both miss the map and post twice.
    messages: Mutex<HashMap<String, MessageHandle>>,
}

impl Reconciler {
    pub fn new(chat: Arc<dyn ChatApi>, channel: String, ui_base_url: String) -> Self {
        Self {
            chat,
            channel,
            ui_base_url,
            messages: Mutex::new(HashMap::new()),
        }
    }

    /// Post or edit the message of a deployment
    ///
    /// On error the stored handle is left untouched, so the next snapshot of
    /// the same deployment retries the same create or edit.
    pub async fn handle(&self, deployment: &Deployment) -> Result<(), NotifierError> {
        let mut messages = self.messages.lock().await;

        let attachments = render(deployment, &self.ui_base_url, Utc::now().timestamp());

        let handle = match messages.get(&deployment.id) {
            None => {
                let handle = self.chat.post_message(&self.channel, &attachments).await?;
                info!(
                    "Posted message {} for deployment {} of job {}",
                    handle, deployment.id, deployment.job_id
                );
                handle
            }
            Some(existing) => {
                debug!(
                    "Updating message {} for deployment {} ({})",
                    existing, deployment.id, deployment.status
                );
                self.chat
                    .update_message(&self.channel, existing, &attachments)
                    .await?
            }
        };

        messages.insert(deployment.id.clone(), handle);
        Ok(())
    }

    /// Handle of the message tracking a deployment, if one was posted
    pub async fn message_handle(&self, deployment_id: &str) -> Option<MessageHandle> {
        self.messages.lock().await.get(deployment_id).cloned()
    }

    /// Number of deployments with a posted message
    pub async fn tracked(&self) -> usize {
        self.messages.lock().await.len()
    }
}

#[async_trait]
impl DeploymentConsumer for Reconciler {
    async fn consume(&self, deployment: Deployment) -> Result<(), NotifierError> {
        self.handle(&deployment).await
    }
}
