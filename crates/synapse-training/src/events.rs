//! Server-pushed training events and connection status.
//!
//! Payload shapes match the `training_update`, `training_complete` and
//! `training_error` events emitted by the training server.

use crate::error::SynapseResult;
use crate::job::{NetworkId, TrainingJobId};
use serde::{Deserialize, Serialize};

pub const TRAINING_UPDATE_EVENT: &str = "training_update";
pub const TRAINING_COMPLETE_EVENT: &str = "training_complete";
pub const TRAINING_ERROR_EVENT: &str = "training_error";
pub const KEEPALIVE_EVENT: &str = "keepalive";

/// One epoch-boundary progress tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingUpdate {
    pub job_id: TrainingJobId,
    pub network_id: NetworkId,
    pub epoch: u32,
    pub total_epochs: u32,
    /// Not yet measured for this epoch when `None`.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Seconds, fractional.
    pub elapsed_time: f64,
    /// 0-100, applied verbatim.
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Successful end of a job stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingComplete {
    pub job_id: TrainingJobId,
    pub network_id: NetworkId,
    pub status: String,
    /// Final accuracy as a 0.0-1.0 fraction.
    pub accuracy: f64,
    #[serde(default)]
    pub message: String,
}

/// Failed end of a job stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingError {
    pub job_id: TrainingJobId,
    pub network_id: NetworkId,
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Transport health, independent of any job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_id: Option<String>,
}

impl ConnectionStatus {
    #[must_use]
    pub fn connected(socket_id: Option<String>) -> Self {
        Self { connected: true, socket_id }
    }

    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }
}

/// Keepalive payload sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keepalive {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Anything that belongs to a single training job.
pub trait JobScoped {
    fn job_id(&self) -> &TrainingJobId;
}

impl JobScoped for TrainingUpdate {
    fn job_id(&self) -> &TrainingJobId {
        &self.job_id
    }
}

impl JobScoped for TrainingComplete {
    fn job_id(&self) -> &TrainingJobId {
        &self.job_id
    }
}

impl JobScoped for TrainingError {
    fn job_id(&self) -> &TrainingJobId {
        &self.job_id
    }
}

/// Any of the three job events, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainingEvent {
    Update(TrainingUpdate),
    Complete(TrainingComplete),
    Error(TrainingError),
}

impl TrainingEvent {
    /// Wire event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Update(_) => TRAINING_UPDATE_EVENT,
            Self::Complete(_) => TRAINING_COMPLETE_EVENT,
            Self::Error(_) => TRAINING_ERROR_EVENT,
        }
    }

    /// Decode a named event payload.
    ///
    /// Returns `Ok(None)` for event names that are not training events.
    pub fn decode(name: &str, payload: serde_json::Value) -> SynapseResult<Option<Self>> {
        let event = match name {
            TRAINING_UPDATE_EVENT => Self::Update(serde_json::from_value(payload)?),
            TRAINING_COMPLETE_EVENT => Self::Complete(serde_json::from_value(payload)?),
            TRAINING_ERROR_EVENT => Self::Error(serde_json::from_value(payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

impl JobScoped for TrainingEvent {
    fn job_id(&self) -> &TrainingJobId {
        match self {
            Self::Update(u) => &u.job_id,
            Self::Complete(c) => &c.job_id,
            Self::Error(e) => &e.job_id,
        }
    }
}
