//! Event stream worker
//!
//! Follows the Nomad deployment event stream and hands every deployment
//! snapshot, in arrival order, to a single consumer.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use nomad_models::Deployment;
use tracing::{debug, error, info, warn};

use crate::errors::NotifierError;
use crate::nomad::stream::{EventFeed, EventStreamDecoder, FeedConnection};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Receiver of deployment snapshots
#[async_trait]
pub trait DeploymentConsumer: Send + Sync {
    async fn consume(&self, deployment: Deployment) -> Result<(), NotifierError>;
}

/// Event stream worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Stream index to start from, 0 replays what Nomad still buffers
    pub start_index: u64,

    /// Backoff between reconnect attempts
    pub reconnect_backoff: CooldownOptions,

    /// Longest silence tolerated on an open stream before reconnecting.
    /// Nomad sends a heartbeat about every 10 seconds.
    pub idle_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            start_index: 0,
            reconnect_backoff: CooldownOptions::default(),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Run the event stream worker until `shutdown_signal` resolves
///
/// Feed errors never end the loop: the stream is reopened from the last seen
/// index after a backoff. A stream silent for longer than `idle_timeout` is
/// treated as dead. Consumer errors are logged and the next snapshot is
/// delivered as usual.
pub async fn run<E, C, S, F>(
    options: &Options,
    feed: &E,
    consumer: &C,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    E: EventFeed,
    C: DeploymentConsumer + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Event stream worker starting...");

    let mut decoder = EventStreamDecoder::with_index(options.start_index);
    let mut attempt: u32 = 0;

    loop {
        let index = decoder.resume_index();
        debug!("Opening deployment event stream at index {}", index);

        let connection = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Event stream worker shutting down...");
                return;
            }
            connection = feed.connect(index) => connection,
        };

        match connection {
            Ok(mut connection) => {
                info!("Subscribed to deployment events at index {}", index);
                attempt = 0;

                loop {
                    let chunk = tokio::select! {
                        _ = &mut shutdown_signal => {
                            info!("Event stream worker shutting down...");
                            return;
                        }
                        chunk = tokio::time::timeout(options.idle_timeout, connection.next_chunk()) => chunk,
                    };

                    let Ok(chunk) = chunk else {
                        warn!(
                            "Deployment event stream silent for {:?}, reconnecting",
                            options.idle_timeout
                        );
                        break;
                    };

                    match chunk {
                        Ok(Some(bytes)) => {
                            for deployment in decoder.feed(&bytes) {
                                // Cancellation lets the in-flight delivery finish
                                // but stops the rest of the batch.
                                if (&mut shutdown_signal).now_or_never().is_some() {
                                    info!("Event stream worker shutting down...");
                                    return;
                                }
                                deliver(consumer, deployment).await;
                            }
                        }
                        Ok(None) => {
                            warn!("Deployment event stream closed by server");
                            break;
                        }
                        Err(e) => {
                            warn!("Deployment event stream error: {}", e);
                            break;
                        }
                    }
                }
                decoder.discard_partial();
            }
            Err(e) => {
                error!("Failed to open deployment event stream: {}", e);
            }
        }

        let delay = calc_exp_backoff(&options.reconnect_backoff, attempt);
        attempt = attempt.saturating_add(1);
        info!("Reconnecting to deployment event stream in {:?}...", delay);

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Event stream worker shutting down...");
                return;
            }
            _ = sleep_fn(delay) => {}
        }
    }
}

async fn deliver<C: DeploymentConsumer + ?Sized>(consumer: &C, deployment: Deployment) {
    let id = deployment.id.clone();
    debug!(
        "Deployment {} is {}: {}",
        id, deployment.status, deployment.status_description
    );
    if let Err(e) = consumer.consume(deployment).await {
        error!("Failed to notify deployment {}: {}", id, e);
    }
}
