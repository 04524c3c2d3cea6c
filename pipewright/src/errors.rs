//! Error types for the pipewright coordination core.
//!
//! Every error aborts the current pipeline run. The coordinator wraps the
//! error in a [`RunFailure`](crate::pipeline::RunFailure) together with the
//! run id, stage name and backend job handle so the scheduler can surface it.

use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// The main error type for pipeline coordination.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The flow-graph document could not be interpreted.
    #[error("Malformed flow graph: {reason}")]
    MalformedGraph {
        /// What was wrong with the document.
        reason: String,
    },

    /// A nested configuration section was requested but is absent.
    #[error("Missing configuration section '{section}'")]
    MissingSection {
        /// The section key.
        section: String,
    },

    /// A required configuration key has neither an override nor a default.
    #[error("Missing configuration key '{key}'")]
    MissingKey {
        /// The configuration key.
        key: String,
    },

    /// A configuration value is present but unusable.
    #[error("Invalid configuration for '{key}': {reason}")]
    InvalidConfig {
        /// The configuration key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The compute backend rejected the job.
    #[error("Submission of job '{job_name}' rejected: {reason}")]
    Submission {
        /// The job name.
        job_name: String,
        /// The backend's reason.
        reason: String,
    },

    /// The backend ran the job but it failed.
    #[error("Job '{job_name}' failed ({handle}): {reason}")]
    JobFailed {
        /// The job name.
        job_name: String,
        /// The backend job handle.
        handle: String,
        /// The backend failure reason.
        reason: String,
    },

    /// The job was cancelled before reaching a successful terminal state.
    #[error("Job '{job_name}' cancelled ({handle}): {reason}")]
    JobCancelled {
        /// The job name.
        job_name: String,
        /// The backend job handle.
        handle: String,
        /// The cancellation reason.
        reason: String,
    },

    /// The run was cancelled between jobs.
    #[error("Run cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },

    /// Output relocation failed part-way; originals were left in place.
    #[error("Relocation of '{source_prefix}' failed: {reason}")]
    Relocation {
        /// The backend-chosen prefix being relocated.
        source_prefix: String,
        /// The underlying failure.
        reason: String,
        /// The backend job whose output was being relocated.
        job_handle: Option<String>,
    },

    /// No usable records reached a stage that needs them.
    #[error("No data found at '{location}'")]
    EmptyDataset {
        /// The location that was expected to hold data.
        location: String,
    },

    /// A pipeline state transition that the state machine does not allow.
    #[error("Invalid pipeline transition: {from} -> {to}")]
    InvalidTransition {
        /// The current state.
        from: String,
        /// The requested state.
        to: String,
    },

    /// A stage output was recorded twice.
    #[error("{0}")]
    OutputConflict(#[from] OutputConflictError),

    /// An object-storage operation failed.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl PipelineError {
    /// Creates a malformed graph error.
    #[must_use]
    pub fn malformed_graph(reason: impl Into<String>) -> Self {
        Self::MalformedGraph {
            reason: reason.into(),
        }
    }

    /// Creates a missing section error.
    #[must_use]
    pub fn missing_section(section: impl Into<String>) -> Self {
        Self::MissingSection {
            section: section.into(),
        }
    }

    /// Creates a missing key error.
    #[must_use]
    pub fn missing_key(key: impl Into<String>) -> Self {
        Self::MissingKey { key: key.into() }
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a submission error.
    #[must_use]
    pub fn submission(job_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Submission {
            job_name: job_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a run cancellation error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Creates a relocation error.
    #[must_use]
    pub fn relocation(source_prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Relocation {
            source_prefix: source_prefix.into(),
            reason: reason.into(),
            job_handle: None,
        }
    }

    /// Attaches the job whose output a relocation error concerns.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_job_handle(self, handle: impl Into<String>) -> Self {
        match self {
            Self::Relocation {
                source_prefix,
                reason,
                ..
            } => Self::Relocation {
                source_prefix,
                reason,
                job_handle: Some(handle.into()),
            },
            other => other,
        }
    }

    /// Creates an empty dataset error.
    #[must_use]
    pub fn empty_dataset(location: impl Into<String>) -> Self {
        Self::EmptyDataset {
            location: location.into(),
        }
    }

    /// Returns a stable error code for the variant.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedGraph { .. } => "FLOW-MALFORMED",
            Self::MissingSection { .. } => "CONFIG-MISSING-SECTION",
            Self::MissingKey { .. } => "CONFIG-MISSING-KEY",
            Self::InvalidConfig { .. } => "CONFIG-INVALID",
            Self::Submission { .. } => "JOB-SUBMISSION",
            Self::JobFailed { .. } => "JOB-FAILED",
            Self::JobCancelled { .. } => "JOB-CANCELLED",
            Self::Cancelled { .. } => "RUN-CANCELLED",
            Self::Relocation { .. } => "ARTIFACT-RELOCATION",
            Self::EmptyDataset { .. } => "ARTIFACT-EMPTY",
            Self::InvalidTransition { .. } => "PIPELINE-TRANSITION",
            Self::OutputConflict(_) => "CONTEXT-CONFLICT",
            Self::Storage(_) => "STORAGE",
            Self::Serialization(_) => "SERIALIZATION",
            Self::Io(_) => "IO",
        }
    }

    /// Returns the backend job handle carried by the error, if any.
    #[must_use]
    pub fn job_handle(&self) -> Option<&str> {
        match self {
            Self::JobFailed { handle, .. } | Self::JobCancelled { handle, .. } => Some(handle),
            Self::Relocation { job_handle, .. } => job_handle.as_deref(),
            _ => None,
        }
    }

    /// Whether re-invoking the whole stage with a fresh run token may help.
    ///
    /// This core never retries; the hint is for the external scheduler.
    #[must_use]
    pub fn is_stage_retryable(&self) -> bool {
        matches!(self, Self::Submission { .. } | Self::Storage(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Some(handle) = self.job_handle() {
            map.insert("job_handle".to_string(), serde_json::json!(handle));
        }
        map.insert(
            "stage_retryable".to_string(),
            serde_json::json!(self.is_stage_retryable()),
        );
        map
    }
}

/// Error raised when a stage output is recorded twice in a run context.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Output conflict for stage '{stage}': {message}")]
pub struct OutputConflictError {
    /// The stage name.
    pub stage: String,
    /// Additional message.
    pub message: String,
}

impl OutputConflictError {
    /// Creates a new output conflict error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct_per_family() {
        assert_eq!(PipelineError::malformed_graph("x").code(), "FLOW-MALFORMED");
        assert_eq!(
            PipelineError::missing_section("outputConfig").code(),
            "CONFIG-MISSING-SECTION"
        );
        assert_eq!(PipelineError::missing_key("role").code(), "CONFIG-MISSING-KEY");
        assert_eq!(PipelineError::empty_dataset("s3://b/p").code(), "ARTIFACT-EMPTY");
    }

    #[test]
    fn test_job_failed_carries_handle() {
        let err = PipelineError::JobFailed {
            job_name: "train-1".to_string(),
            handle: "arn:job/train-1".to_string(),
            reason: "AlgorithmError".to_string(),
        };

        assert_eq!(err.job_handle(), Some("arn:job/train-1"));
        let dict = err.to_dict();
        assert_eq!(dict.get("job_handle").unwrap(), "arn:job/train-1");
        assert_eq!(dict.get("code").unwrap(), "JOB-FAILED");
    }

    #[test]
    fn test_relocation_carries_attached_handle() {
        let err = PipelineError::relocation("s3://b/p/job-1/", "copy failed");
        assert_eq!(err.job_handle(), None);

        let err = err.with_job_handle("arn:job/job-1");
        assert_eq!(err.job_handle(), Some("arn:job/job-1"));
        assert_eq!(err.to_dict().get("job_handle").unwrap(), "arn:job/job-1");

        let other = PipelineError::missing_key("role").with_job_handle("arn:job/job-1");
        assert_eq!(other.job_handle(), None);
    }

    #[test]
    fn test_missing_section_message() {
        let err = PipelineError::missing_section("outputConfig");
        assert_eq!(err.to_string(), "Missing configuration section 'outputConfig'");
    }

    #[test]
    fn test_stage_retryable_hint() {
        assert!(PipelineError::submission("j", "throttled").is_stage_retryable());
        assert!(!PipelineError::malformed_graph("empty").is_stage_retryable());
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: PipelineError = parse.unwrap_err().into();
        assert_eq!(err.code(), "SERIALIZATION");
    }
}
