//! Nomad event stream decoding
//!
//! `/v1/event/stream` answers with newline-delimited JSON frames. A frame may
//! be split across HTTP chunks, so bytes are buffered until a newline shows up.

use async_trait::async_trait;
use nomad_models::{Deployment, DeploymentPayload, EventFrame, DEPLOYMENT_TOPIC};
use tracing::{debug, warn};

use crate::errors::NotifierError;

/// Source of event stream connections
#[async_trait]
pub trait EventFeed: Send + Sync {
    type Connection: FeedConnection;

    /// Open the stream, starting at `index` (0 replays whatever Nomad buffers)
    async fn connect(&self, index: u64) -> Result<Self::Connection, NotifierError>;
}

/// An open event stream
#[async_trait]
pub trait FeedConnection: Send {
    /// Next chunk of raw bytes, `None` once the server closed the stream
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, NotifierError>;
}

/// Largest frame kept in memory; longer lines are dropped
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Incremental decoder of event stream frames
#[derive(Debug)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    // Bytes of `buffer` already known to contain no newline
    scanned: usize,
    // Set while skipping the rest of an oversized line
    discarding: bool,
    max_frame_bytes: usize,
    last_index: u64,
}

impl Default for EventStreamDecoder {
    fn default() -> Self {
        Self::with_index(0)
    }
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder resuming after a known stream index
    pub fn with_index(last_index: u64) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            discarding: false,
            max_frame_bytes: MAX_FRAME_BYTES,
            last_index,
        }
    }

    /// Override the frame size limit
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Highest frame index seen so far
    pub fn last_index(&self) -> u64 {
        self.last_index
    }

    /// Index to resume the stream from after a reconnect
    pub fn resume_index(&self) -> u64 {
        if self.last_index == 0 {
            0
        } else {
            self.last_index + 1
        }
    }

    /// Drop a partially received frame, used when a connection is lost
    pub fn discard_partial(&mut self) {
        if !self.buffer.is_empty() {
            debug!("Discarding {} bytes of partial frame", self.buffer.len());
            self.buffer.clear();
        }
        self.scanned = 0;
        self.discarding = false;
    }

    /// Feed raw bytes and return the deployments of every completed frame
    ///
    /// Lines that fail to decode or exceed the frame size limit are logged
    /// and skipped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Deployment> {
        self.buffer.extend_from_slice(chunk);

        let mut deployments = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let pos = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.scanned = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_slice::<EventFrame>(line) {
                Ok(frame) => self.collect(frame, &mut deployments),
                Err(e) => warn!("Dropping undecodable event stream frame: {}", e),
            }
        }
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_frame_bytes {
            if !self.discarding {
                warn!(
                    "Dropping event stream frame larger than {} bytes",
                    self.max_frame_bytes
                );
            }
            self.buffer.clear();
            self.scanned = 0;
            self.discarding = true;
        }
        deployments
    }

    fn collect(&mut self, frame: EventFrame, deployments: &mut Vec<Deployment>) {
        if frame.is_heartbeat() {
            debug!("Event stream heartbeat");
            return;
        }
        self.last_index = self.last_index.max(frame.index);

        for event in frame.events {
            if event.topic != DEPLOYMENT_TOPIC {
                debug!("Ignoring {} event {}", event.topic, event.key);
                continue;
            }
            match serde_json::from_value::<DeploymentPayload>(event.payload) {
                Ok(payload) => deployments.push(payload.deployment),
                Err(e) => warn!(
                    "Dropping {} event for {} at index {}: {}",
                    event.event_type, event.key, event.index, e
                ),
            }
        }
    }
}
