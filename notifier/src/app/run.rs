//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use secrecy::SecretString;

use crate::app::options::{AppOptions, LifecycleOptions, ServerOptions};
use crate::app::state::AppState;
use crate::errors::NotifierError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::event_stream;

/// Run the notifier until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), NotifierError> {
    info!("Initializing Nomad deploy notifier...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(options, &shutdown_tx, &mut shutdown_manager).await {
        error!("Failed to start notifier: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    mut options: AppOptions,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), NotifierError> {
    let signing_secret = options.slack.signing_secret.take();
    let app_state = Arc::new(AppState::init(options.slack, options.nomad)?);
    shutdown_manager.with_app_state(app_state.clone())?;

    if options.enable_action_server {
        init_action_server(
            &options.server,
            signing_secret,
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )
        .await?;
    }

    init_event_stream_worker(
        options.event_stream,
        app_state,
        shutdown_manager,
        shutdown_tx.subscribe(),
    )
}

fn init_event_stream_worker(
    options: event_stream::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), NotifierError> {
    info!("Initializing event stream worker...");

    let nomad = app_state.nomad.clone();
    let reconciler = app_state.reconciler.clone();

    let handle = tokio::spawn(async move {
        event_stream::run(
            &options,
            nomad.as_ref(),
            reconciler.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_event_stream_worker_handle(handle)
}

async fn init_action_server(
    options: &ServerOptions,
    signing_secret: Option<SecretString>,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), NotifierError> {
    info!("Initializing action server...");

    // Never serve unauthenticated promote/fail requests
    let signing_secret = signing_secret.ok_or_else(|| {
        NotifierError::ConfigError("action server requires a Slack signing secret".to_string())
    })?;
    let server_state = ServerState::new(app_state.nomad.clone(), signing_secret);

    let handle = serve(options, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_action_server_handle(handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    action_server_handle: Option<JoinHandle<Result<(), NotifierError>>>,
    event_stream_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            action_server_handle: None,
            event_stream_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), NotifierError> {
        if self.app_state.is_some() {
            return Err(NotifierError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_event_stream_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), NotifierError> {
        if self.event_stream_worker_handle.is_some() {
            return Err(NotifierError::ShutdownError(
                "event_stream_handle already set".to_string(),
            ));
        }
        self.event_stream_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_action_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), NotifierError>>,
    ) -> Result<(), NotifierError> {
        if self.action_server_handle.is_some() {
            return Err(NotifierError::ShutdownError("server_handle already set".to_string()));
        }
        self.action_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), NotifierError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), NotifierError> {
        info!("Shutting down Nomad deploy notifier...");

        // 1. Event stream worker, lets an in-flight Slack call finish
        if let Some(handle) = self.event_stream_worker_handle.take() {
            handle.await.map_err(|e| NotifierError::ShutdownError(e.to_string()))?;
        }

        // 2. Action server
        if let Some(handle) = self.action_server_handle.take() {
            handle.await.map_err(|e| NotifierError::ShutdownError(e.to_string()))??;
        }

        // 3. App state
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
