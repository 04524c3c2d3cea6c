//! Serializable run-context snapshots.
//!
//! An external scheduler invokes stages as separate tasks and passes state
//! between them as a key-value bag. A snapshot is that bag: enough to rebuild
//! a [`RunContext`](super::RunContext) for the next stage invocation.

use super::{RunToken, StageOutputEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A point-in-time copy of a run context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// The run token.
    pub token: RunToken,
    /// The pipeline name.
    pub pipeline_name: String,
    /// Number of job names handed out so far.
    pub job_sequence: u32,
    /// Recorded stage outputs keyed by stage name.
    #[serde(default)]
    pub stage_outputs: BTreeMap<String, StageOutputEntry>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

impl ContextSnapshot {
    /// Serializes the snapshot to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the outputs cannot be encoded.
    pub fn to_value(&self) -> crate::errors::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Restores a snapshot from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the value is not a snapshot.
    pub fn from_value(value: serde_json::Value) -> crate::errors::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the stages that have recorded outputs.
    #[must_use]
    pub fn completed_stages(&self) -> Vec<&str> {
        self.stage_outputs.keys().map(String::as_str).collect()
    }
}
