//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::NotifierError;
use crate::server::handlers::{actions_handler, health_handler, version_handler};
use crate::server::state::ServerState;

/// Build the router serving Slack interactions
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Slack interactive buttons
        .route("/slack/actions", post(actions_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), NotifierError>>, NotifierError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting action server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| NotifierError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| NotifierError::ServerError(e.to_string()))
    });

    Ok(handle)
}
