//! Nomad API models
//!
//! Nomad serializes its structs with PascalCase keys. Only the fields the
//! notifier reads are modelled; everything else is ignored on decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Event stream topic carrying deployment updates
pub const DEPLOYMENT_TOPIC: &str = "Deployment";

/// A deployment snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Deployment {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(rename = "JobID")]
    pub job_id: String,

    #[serde(default)]
    pub job_version: u64,

    /// Coarse status: running, successful, failed, cancelled, paused, ...
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub status_description: String,

    /// Per task group state, keyed by group name
    #[serde(default)]
    pub task_groups: BTreeMap<String, DeploymentState>,
}

/// Deployment state of a single task group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeploymentState {
    pub auto_revert: bool,
    pub promoted: bool,
    pub desired_canaries: u32,
    pub desired_total: u32,
    pub placed_allocs: u32,
    pub healthy_allocs: u32,
    pub unhealthy_allocs: u32,
}

/// One newline-delimited frame of `/v1/event/stream`
///
/// Heartbeats arrive as `{}` and decode to a frame with no events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EventFrame {
    pub index: u64,
    pub events: Vec<Event>,
}

impl EventFrame {
    pub fn is_heartbeat(&self) -> bool {
        self.index == 0 && self.events.is_empty()
    }
}

/// A single event inside a frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Event {
    pub topic: String,
    #[serde(rename = "Type")]
    pub event_type: String,
    pub key: String,
    pub index: u64,
    pub payload: serde_json::Value,
}

/// Payload of a `Deployment` topic event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentPayload {
    pub deployment: Deployment,
}

/// Body of `POST /v1/deployment/promote/:id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentPromoteRequest {
    #[serde(rename = "DeploymentID")]
    pub deployment_id: String,
    pub all: bool,
}

/// Body of `POST /v1/deployment/fail/:id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentFailRequest {
    #[serde(rename = "DeploymentID")]
    pub deployment_id: String,
}

/// Response to deployment promote/fail requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeploymentUpdateResponse {
    #[serde(rename = "EvalID")]
    pub eval_id: String,
    pub eval_create_index: u64,
    pub deployment_modify_index: u64,
    pub index: u64,
}
