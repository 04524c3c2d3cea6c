//! Stage kind and job status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Builds the per-run configuration bundle.
    Configure,
    /// Runs the flow-graph transformation job and relocates its output.
    Transform,
    /// Runs the training job on the relocated output.
    Train,
    /// Publishes the trained model.
    Register,
}

impl StageKind {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [Self::Configure, Self::Transform, Self::Train, Self::Register];

    /// The name under which the stage's result is recorded in the run context.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configure => "start",
            Self::Transform => "transform",
            Self::Train => "train",
            Self::Register => "register",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a backend job as reported by a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted but not yet running.
    Pending,
    /// Running.
    InProgress,
    /// A stop was requested and the job is winding down.
    Stopping,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
    /// Stopped before completion.
    Stopped,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Stopping => write!(f, "stopping"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl JobStatus {
    /// Maps the status onto a terminal status, if it is one.
    #[must_use]
    pub fn terminal(&self) -> Option<TerminalStatus> {
        match self {
            Self::Completed => Some(TerminalStatus::Succeeded),
            Self::Failed => Some(TerminalStatus::Failed),
            Self::Stopped => Some(TerminalStatus::Cancelled),
            Self::Pending | Self::InProgress | Self::Stopping => None,
        }
    }

    /// Returns true if the job will not change status again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal().is_some()
    }
}

/// The final status of a backend job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    /// The job completed successfully.
    Succeeded,
    /// The job ran and failed.
    Failed,
    /// The job was stopped.
    Cancelled,
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_names() {
        assert_eq!(StageKind::Configure.to_string(), "start");
        assert_eq!(StageKind::Transform.to_string(), "transform");
        assert_eq!(StageKind::Train.to_string(), "train");
        assert_eq!(StageKind::Register.to_string(), "register");
    }

    #[test]
    fn test_stage_kind_order() {
        let mut kinds = vec![StageKind::Register, StageKind::Configure, StageKind::Train];
        kinds.sort();
        assert_eq!(kinds, vec![StageKind::Configure, StageKind::Train, StageKind::Register]);
    }

    #[test]
    fn test_job_status_terminal_mapping() {
        assert_eq!(JobStatus::Completed.terminal(), Some(TerminalStatus::Succeeded));
        assert_eq!(JobStatus::Failed.terminal(), Some(TerminalStatus::Failed));
        assert_eq!(JobStatus::Stopped.terminal(), Some(TerminalStatus::Cancelled));
        assert!(!JobStatus::Stopping.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn test_job_status_serialize() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap();
        assert_eq!(json, r#""in_progress""#);

        let status: TerminalStatus = serde_json::from_str(r#""cancelled""#).unwrap();
        assert_eq!(status, TerminalStatus::Cancelled);
    }
}
