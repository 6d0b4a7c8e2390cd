//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::{NomadOptions, SlackOptions};
use crate::errors::NotifierError;
use crate::nomad::client::NomadClient;
use crate::notify::reconciler::Reconciler;
use crate::slack::client::SlackClient;

/// Main application state
pub struct AppState {
    /// Nomad API client, also the event feed
    pub nomad: Arc<NomadClient>,

    /// Deployment message reconciler
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    /// Initialize application state
    pub fn init(slack: SlackOptions, nomad: NomadOptions) -> Result<Self, NotifierError> {
        info!("Initializing application state...");

        let nomad_client = Arc::new(NomadClient::new(&nomad.address, nomad.token)?);

        let slack_client = Arc::new(SlackClient::new(&slack.api_base_url, slack.token)?);
        info!(
            "Posting deployment updates to channel {} via {}",
            slack.channel,
            slack_client.base_url()
        );

        let reconciler = Arc::new(Reconciler::new(slack_client, slack.channel, nomad.ui_base_url));

        Ok(Self {
            nomad: nomad_client,
            reconciler,
        })
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), NotifierError> {
        info!(
            "Shutting down application state, {} deployment messages tracked",
            self.reconciler.tracked().await
        );
        Ok(())
    }
}
