//! Nomad HTTP API client

use std::time::Duration;

use async_trait::async_trait;
use nomad_models::{
    DeploymentFailRequest, DeploymentPromoteRequest, DeploymentUpdateResponse, DEPLOYMENT_TOPIC,
};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::NotifierError;
use crate::nomad::stream::{EventFeed, FeedConnection};

const NOMAD_TOKEN_HEADER: &str = "X-Nomad-Token";

/// Operator actions on a deployment
#[async_trait]
pub trait DeploymentActions: Send + Sync {
    /// Promote all canaries of a deployment
    async fn promote_deployment(&self, deployment_id: &str) -> Result<DeploymentUpdateResponse, NotifierError>;

    /// Mark a deployment as failed
    async fn fail_deployment(&self, deployment_id: &str) -> Result<DeploymentUpdateResponse, NotifierError>;
}

/// HTTP client for the Nomad API
pub struct NomadClient {
    client: Client,
    base_url: Url,
    token: Option<SecretString>,
    request_timeout: Duration,
}

impl NomadClient {
    /// Create a new Nomad client
    ///
    /// No overall timeout is set on the underlying client since the event
    /// stream is a long-lived response; regular requests carry their own.
    pub fn new(address: &str, token: Option<SecretString>) -> Result<Self, NotifierError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(address.trim_end_matches('/'))?,
            token,
            request_timeout: Duration::from_secs(30),
        })
    }

    /// URL of the deployment event stream starting at `index`
    pub fn event_stream_url(&self, index: u64) -> Result<Url, NotifierError> {
        let mut url = self.base_url.join("/v1/event/stream")?;
        url.query_pairs_mut()
            .append_pair("topic", DEPLOYMENT_TOPIC)
            .append_pair("index", &index.to_string());
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(NOMAD_TOKEN_HEADER, token.expose_secret()),
            None => request,
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, NotifierError> {
        let url = self.base_url.join(path)?;
        debug!("POST {}", url);

        let request = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .json(body);
        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Nomad POST {} failed: {} - {}", path, status, body);
            return Err(NotifierError::NomadError(format!("{}: {}", status, body.trim())));
        }

        let body = response.json().await?;
        Ok(body)
    }
}

#[async_trait]
impl DeploymentActions for NomadClient {
    async fn promote_deployment(&self, deployment_id: &str) -> Result<DeploymentUpdateResponse, NotifierError> {
        let path = format!("/v1/deployment/promote/{}", deployment_id);
        let body = DeploymentPromoteRequest {
            deployment_id: deployment_id.to_string(),
            all: true,
        };
        self.post(&path, &body).await
    }

    async fn fail_deployment(&self, deployment_id: &str) -> Result<DeploymentUpdateResponse, NotifierError> {
        let path = format!("/v1/deployment/fail/{}", deployment_id);
        let body = DeploymentFailRequest {
            deployment_id: deployment_id.to_string(),
        };
        self.post(&path, &body).await
    }
}

/// An open `/v1/event/stream` response
pub struct NomadEventStream {
    response: Response,
}

#[async_trait]
impl FeedConnection for NomadEventStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, NotifierError> {
        let chunk = self.response.chunk().await?;
        Ok(chunk.map(|bytes| bytes.to_vec()))
    }
}

#[async_trait]
impl EventFeed for NomadClient {
    type Connection = NomadEventStream;

    async fn connect(&self, index: u64) -> Result<NomadEventStream, NotifierError> {
        let url = self.event_stream_url(index)?;
        debug!("GET {}", url);

        let response = self.authorize(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifierError::StreamError(format!("{}: {}", status, body.trim())));
        }

        Ok(NomadEventStream { response })
    }
}
