//! Run results handed back to the scheduler.

use super::{PipelineState, StateChange};
use crate::core::{ArtifactLocation, StageKind};
use crate::errors::PipelineError;
use crate::stages::{RegisterOutcome, TransformOutcome};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// A completed run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// The run id.
    pub run_id: String,
    /// The pipeline name.
    pub pipeline: String,
    /// Every state the run entered.
    pub history: Vec<StateChange>,
    /// Recorded stage outputs keyed by stage name.
    pub outputs: BTreeMap<String, serde_json::Value>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl PipelineRun {
    /// The final state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.history.last().map_or(PipelineState::Init, |c| c.state)
    }

    /// The output recorded by a stage.
    #[must_use]
    pub fn output(&self, stage: StageKind) -> Option<&serde_json::Value> {
        self.outputs.get(stage.as_str())
    }

    /// Where the relocated training data lives.
    #[must_use]
    pub fn training_data(&self) -> Option<ArtifactLocation> {
        self.output(StageKind::Transform)
            .and_then(|v| serde_json::from_value::<TransformOutcome>(v.clone()).ok())
            .map(|outcome| outcome.training_data)
    }

    /// The published model.
    #[must_use]
    pub fn registered_model(&self) -> Option<RegisterOutcome> {
        self.output(StageKind::Register)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("run_id".to_string(), serde_json::json!(self.run_id));
        map.insert("pipeline".to_string(), serde_json::json!(self.pipeline));
        map.insert("state".to_string(), serde_json::json!(self.state()));
        map.insert("outputs".to_string(), serde_json::json!(self.outputs));
        map.insert("duration_ms".to_string(), serde_json::json!(self.duration_ms));
        map
    }
}

/// A failed run.
#[derive(Debug, Error)]
#[error("Pipeline run '{run_id}' failed in stage '{stage}': {error}")]
pub struct RunFailure {
    /// The run id.
    pub run_id: String,
    /// The pipeline name.
    pub pipeline: String,
    /// The stage that raised the error.
    pub stage: StageKind,
    /// The backend job handle, when a job was involved.
    pub job_handle: Option<String>,
    /// The error.
    #[source]
    pub error: PipelineError,
    /// Every state the run entered, ending in `Failed`.
    pub history: Vec<StateChange>,
}

impl RunFailure {
    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("run_id".to_string(), serde_json::json!(self.run_id));
        map.insert("pipeline".to_string(), serde_json::json!(self.pipeline));
        map.insert("stage".to_string(), serde_json::json!(self.stage.as_str()));
        map.insert("job_handle".to_string(), serde_json::json!(self.job_handle));
        map.insert("error".to_string(), serde_json::json!(self.error.to_dict()));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_failure_dict() {
        let failure = RunFailure {
            run_id: "07-04-05-09-a1b2c3d4".to_string(),
            pipeline: "ml-pipeline".to_string(),
            stage: StageKind::Train,
            job_handle: Some("arn:job/t".to_string()),
            error: PipelineError::JobFailed {
                job_name: "t".to_string(),
                handle: "arn:job/t".to_string(),
                reason: "AlgorithmError".to_string(),
            },
            history: vec![StateChange {
                state: PipelineState::Failed,
                at: Utc::now(),
            }],
        };

        let dict = failure.to_dict();
        assert_eq!(dict["stage"], "train");
        assert_eq!(dict["job_handle"], "arn:job/t");
        assert_eq!(dict["error"]["code"], "JOB-FAILED");
        assert!(failure.to_string().contains("failed in stage 'train'"));
    }

    #[test]
    fn test_run_accessors_tolerate_missing_outputs() {
        let run = PipelineRun {
            run_id: "r".to_string(),
            pipeline: "p".to_string(),
            history: Vec::new(),
            outputs: BTreeMap::new(),
            duration_ms: 0.0,
        };

        assert_eq!(run.state(), PipelineState::Init);
        assert!(run.training_data().is_none());
        assert!(run.registered_model().is_none());
    }
}
