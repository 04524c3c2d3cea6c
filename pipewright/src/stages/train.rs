use super::{Stage, TransformOutcome, TRACING_TARGET};
use crate::config::{PipelineConfigBundle, TrainingConfig};
use crate::context::RunContext;
use crate::core::{ArtifactLocation, ArtifactRole, StageKind};
use crate::errors::{PipelineError, Result};
use crate::jobs::{InputMount, JobHandle, JobKind, JobRunner, JobSpec, OutputMount, UploadMode};
use crate::storage::{ArtifactStore, StorageUri};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What the train stage records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainOutcome {
    /// The training job.
    pub job: JobHandle,
    /// The data the model was trained on.
    pub training_data: String,
    /// The model archive.
    pub model_artifact: ArtifactLocation,
}

/// Builds the training job reading from `input_uri`.
#[must_use]
pub fn training_job_spec(config: &TrainingConfig, input_uri: &str, job_name: &str) -> JobSpec {
    let channel = &config.channel;
    let mut spec = JobSpec::new(
        job_name,
        JobKind::Training,
        &config.algorithm.training_image,
        &config.role,
        config.resources.clone(),
    )
    .with_input(
        InputMount::new(&channel.channel_name, input_uri)
            .with_access(channel.data_type, config.algorithm.training_input_mode, channel.distribution)
            .with_content_type(&channel.content_type),
    )
    .with_output(OutputMount {
        name: "model".to_string(),
        source: None,
        destination_uri: config.output_path.clone(),
        upload_mode: UploadMode::EndOfJob,
    });

    spec.hyperparameters = config.hyperparameters.clone();
    spec.max_runtime_seconds = Some(config.max_runtime_seconds);
    spec.wait = config.wait_for_completion;
    spec.check_interval_seconds = Some(config.check_interval_seconds);
    spec
}

/// Trains a model on the relocated transform output.
pub struct TrainStage {
    store: Arc<dyn ArtifactStore>,
    runner: Arc<dyn JobRunner>,
}

impl fmt::Debug for TrainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainStage").field("store", &self.store).finish_non_exhaustive()
    }
}

impl TrainStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>, runner: Arc<dyn JobRunner>) -> Self {
        Self { store, runner }
    }

    /// Fails with `EmptyDataset` unless `input_uri` holds at least one object.
    async fn ensure_data(&self, input_uri: &str) -> Result<()> {
        let location = StorageUri::parse(input_uri)?;
        let prefix = format!("{}/", location.key.trim_end_matches('/'));
        let keys = self.store.list(&location.bucket, &prefix).await?;
        if keys.is_empty() {
            return Err(PipelineError::empty_dataset(input_uri));
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for TrainStage {
    fn kind(&self) -> StageKind {
        StageKind::Train
    }

    async fn execute(&self, ctx: &RunContext) -> Result<serde_json::Value> {
        let bundle: PipelineConfigBundle = ctx.output_as(StageKind::Configure)?;
        let config = &bundle.training;

        let input_uri = if ctx.has_output(StageKind::Transform) {
            ctx.output_as::<TransformOutcome>(StageKind::Transform)?.training_data.uri
        } else {
            config.channel.input_uri.clone()
        };
        self.ensure_data(&input_uri).await?;

        let job_name = ctx.next_job_name(&config.job_name_prefix);
        tracing::info!(
            target: TRACING_TARGET,
            run_id = %ctx.run_id(),
            job_name = %job_name,
            input = %input_uri,
            "Starting training job"
        );

        let spec = training_job_spec(config, &input_uri, &job_name);
        let cancellation = ctx.cancellation();
        let submission = self.runner.submit(&spec, &cancellation).await?;
        let outcome = match submission.outcome {
            Some(outcome) => outcome,
            None => {
                let interval = spec.check_interval().unwrap_or_else(|| self.runner.poll_interval());
                self.runner.wait(&submission.handle, interval, &cancellation).await?
            }
        };
        let job = outcome.into_result()?;

        Ok(serde_json::to_value(TrainOutcome {
            job,
            training_data: input_uri,
            model_artifact: ArtifactLocation::new(config.model_data_url(&job_name), ArtifactRole::ModelArtifact),
        })?)
    }
}
