//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use slack_models::{InteractionPayload, InteractionReply};
use tracing::{info, warn};

use crate::notify::render::{FAIL_ACTION, PROMOTE_ACTION};
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "nomad-deploy-notifier".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// The `payload` field of the form body Slack posts for interactive messages
fn form_payload(body: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == "payload")
        .map(|(_, value)| value.into_owned())
}

fn reply(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(InteractionReply::ephemeral(text))).into_response()
}

/// Handles promote/fail button clicks on deployment messages
///
/// The signature covers the raw body, so it is checked before any parsing.
pub async fn actions_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = state.verify_request(&headers, &body) {
        warn!("Rejecting unsigned interaction: {}", e);
        return reply(StatusCode::UNAUTHORIZED, "invalid signature");
    }

    let Some(raw_payload) = form_payload(&body) else {
        return reply(StatusCode::BAD_REQUEST, "missing payload");
    };
    let payload: InteractionPayload = match serde_json::from_str(&raw_payload) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Rejecting undecodable interaction payload: {}", e);
            return reply(StatusCode::BAD_REQUEST, "invalid payload");
        }
    };

    let deployment_id = payload.callback_id.as_str();
    let Some(action) = payload.actions.first() else {
        return reply(StatusCode::BAD_REQUEST, "no action");
    };
    if deployment_id.is_empty() {
        return reply(StatusCode::BAD_REQUEST, "no deployment");
    }

    info!(
        "User {} requested {} of deployment {}",
        payload.user.name, action.name, deployment_id
    );

    let result = match action.name.as_str() {
        PROMOTE_ACTION => state.deployments.promote_deployment(deployment_id).await,
        FAIL_ACTION => state.deployments.fail_deployment(deployment_id).await,
        other => {
            warn!("Unknown interaction action: {}", other);
            return reply(StatusCode::BAD_REQUEST, format!("unknown action {}", other));
        }
    };

    match result {
        Ok(update) => {
            info!(
                "Deployment {} {} requested, evaluation {}",
                deployment_id, action.name, update.eval_id
            );
            reply(
                StatusCode::OK,
                format!("{} requested for deployment {}", action.name, deployment_id),
            )
        }
        Err(e) => {
            warn!("Failed to {} deployment {}: {}", action.name, deployment_id, e);
            reply(
                StatusCode::BAD_GATEWAY,
                format!("failed to {} deployment {}: {}", action.name, deployment_id, e),
            )
        }
    }
}
