use super::{Stage, TRACING_TARGET};
use crate::config::{PipelineConfigBundle, TransformConfig};
use crate::context::RunContext;
use crate::core::{ArtifactLocation, ArtifactRole, StageKind};
use crate::errors::Result;
use crate::flow::{parse_flow_bytes, FlowSource, ParsedFlow};
use crate::jobs::{InputMount, JobHandle, JobKind, JobRunner, JobSpec, OutputMount, ResourceConfig};
use crate::storage::{relocate, ArtifactStore, RelocatedObject, RelocationPlan, StorageUri};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Job name prefix of transform jobs.
pub const TRANSFORM_JOB_PREFIX: &str = "data-wrangler-flow-processing";

/// Container directory inputs and outputs are mounted under.
const PROCESSING_BASE_DIR: &str = "/opt/ml/processing";

/// What the transform stage records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOutcome {
    /// The transform job.
    pub job: JobHandle,
    /// Composite output name from the flow graph.
    pub output_name: String,
    /// Sources the job read.
    pub sources: Vec<FlowSource>,
    /// Where the processed data now lives.
    pub training_data: ArtifactLocation,
    /// Objects moved during relocation.
    pub relocated: Vec<RelocatedObject>,
}

/// Builds the transform job for a parsed flow.
///
/// The flow document is mounted as input `flow`, then each source under its
/// dataset name. The single output is uploaded to `{bucket}/{prefix}`.
#[must_use]
pub fn transform_job_spec(
    config: &TransformConfig,
    flow: &ParsedFlow,
    flow_uri: &str,
    output_root: &StorageUri,
    job_name: &str,
) -> JobSpec {
    let mount = |name: &str, uri: &str| {
        InputMount::new(name, uri)
            .with_destination(format!("{PROCESSING_BASE_DIR}/{name}"))
            .with_access(
                config.s3_data_type,
                config.s3_input_mode,
                config.s3_data_distribution_type,
            )
    };

    let mut output_config = serde_json::Map::new();
    output_config.insert(
        flow.output_name.clone(),
        serde_json::json!({"content_type": config.output.output_content_type}),
    );
    let output_config = serde_json::Value::Object(output_config);

    let mut spec = JobSpec::new(
        job_name,
        JobKind::Processing,
        config.image(),
        &config.sagemaker_role,
        ResourceConfig {
            instance_count: config.instance_count,
            instance_type: config.instance_type.clone(),
            volume_size_in_gb: config.volume_size_in_gb,
        },
    )
    .with_input(mount("flow", flow_uri))
    .with_output(OutputMount {
        name: flow.output_name.clone(),
        source: Some(format!("{PROCESSING_BASE_DIR}/output")),
        destination_uri: output_root.to_string(),
        upload_mode: config.s3_output_upload_mode,
    })
    .with_argument(format!("--output-config '{output_config}'"));

    for source in &flow.sources {
        spec = spec.with_input(mount(&source.name, &source.uri));
    }

    spec.network_isolation = config.enable_network_isolation;
    spec.kms_key = config.kms_key.clone();
    spec.wait = config.wait_for_processing;
    spec
}

/// Runs the flow-graph transform and moves its output to a deterministic,
/// run-scoped location.
pub struct TransformStage {
    store: Arc<dyn ArtifactStore>,
    runner: Arc<dyn JobRunner>,
}

impl fmt::Debug for TransformStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformStage").field("store", &self.store).finish_non_exhaustive()
    }
}

impl TransformStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>, runner: Arc<dyn JobRunner>) -> Self {
        Self { store, runner }
    }
}

#[async_trait]
impl Stage for TransformStage {
    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    async fn execute(&self, ctx: &RunContext) -> Result<serde_json::Value> {
        let bundle: PipelineConfigBundle = ctx.output_as(StageKind::Configure)?;
        let config = &bundle.transform;

        let flow = parse_flow_bytes(&self.store.read(&bundle.flow_uri).await?)?;
        let prefix = config.output.effective_prefix(ctx.token());
        let output_root = StorageUri::new(&bundle.storage_scheme, &config.output.output_bucket, &prefix);
        let job_name = ctx.next_job_name(TRANSFORM_JOB_PREFIX);

        tracing::info!(
            target: TRACING_TARGET,
            run_id = %ctx.run_id(),
            job_name = %job_name,
            sources = flow.sources.len(),
            instances = config.instance_count,
            instance_type = %config.instance_type,
            "Starting transform job"
        );

        let spec = transform_job_spec(config, &flow, &bundle.flow_uri, &output_root, &job_name);
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

        let source = output_root.with_key(format!("{prefix}/{job_name}/"));
        let destination = output_root
            .with_key(config.output.run_namespace(ctx.token()))
            .join("train");
        let report = relocate(self.store.as_ref(), &RelocationPlan::new(source, destination))
            .await
            .map_err(|e| e.with_job_handle(&job.id))?;

        let training_data = ArtifactLocation::new(report.destination.clone(), ArtifactRole::ProcessedTrainingData)
            .with_object_count(report.len());

        tracing::info!(
            target: TRACING_TARGET,
            run_id = %ctx.run_id(),
            job_name = %job_name,
            location = %training_data.uri,
            objects = report.len(),
            "Transform output relocated"
        );

        Ok(serde_json::to_value(TransformOutcome {
            job,
            output_name: flow.output_name,
            sources: flow.sources,
            training_data,
            relocated: report.objects,
        })?)
    }
}
