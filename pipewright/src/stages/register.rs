use super::{Stage, TrainOutcome, TRACING_TARGET};
use crate::config::PipelineConfigBundle;
use crate::context::RunContext;
use crate::core::StageKind;
use crate::errors::Result;
use crate::jobs::{ModelHandle, ModelRegistry, ModelSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What the register stage records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOutcome {
    /// The published model.
    pub model: ModelHandle,
    /// The archive the model serves.
    pub model_data_url: String,
}

/// Publishes the trained model.
pub struct RegisterStage {
    registry: Arc<dyn ModelRegistry>,
}

impl fmt::Debug for RegisterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterStage").finish_non_exhaustive()
    }
}

impl RegisterStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(registry: Arc<dyn ModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Stage for RegisterStage {
    fn kind(&self) -> StageKind {
        StageKind::Register
    }

    async fn execute(&self, ctx: &RunContext) -> Result<serde_json::Value> {
        let bundle: PipelineConfigBundle = ctx.output_as(StageKind::Configure)?;
        let trained: TrainOutcome = ctx.output_as(StageKind::Train)?;
        let config = &bundle.model;

        let spec = ModelSpec {
            model_name: config.model_name(ctx.token()),
            image: config.image.clone(),
            model_data_url: trained.model_artifact.uri,
            execution_role: config.execution_role.clone(),
            mode: config.mode,
        };
        let model = self.registry.register(&spec).await?;

        tracing::info!(
            target: TRACING_TARGET,
            run_id = %ctx.run_id(),
            model_name = %model.model_name,
            "Model registered"
        );

        Ok(serde_json::to_value(RegisterOutcome {
            model,
            model_data_url: spec.model_data_url,
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RunContext, RunToken};
    use crate::core::{ArtifactLocation, ArtifactRole};
    use crate::jobs::{ContainerMode, InMemoryModelRegistry, JobHandle, JobKind};
    use crate::stages::ConfigureStage;
    use crate::testing::{sample_params, SAMPLE_ROLE};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    const ARCHIVE: &str =
        "s3://bucket/data-wrangler-pipeline/07-04-05-09-a1b2c3d4/xgboost/XGBoost-training-07-04-05-09-a1b2c3d4-2/output/model.tar.gz";

    async fn trained_context() -> RunContext {
        let ctx = RunContext::with_token("ml-pipeline", RunToken::from_existing("07-04-05-09-a1b2c3d4"));
        let bundle = ConfigureStage::new(sample_params("s3://bucket/flows/claims.flow"))
            .execute(&ctx)
            .await
            .unwrap();
        ctx.record_value(StageKind::Configure, bundle).unwrap();
        ctx.record(
            StageKind::Train,
            &TrainOutcome {
                job: JobHandle {
                    job_name: "XGBoost-training-07-04-05-09-a1b2c3d4-2".to_string(),
                    id: "arn:job/XGBoost-training-07-04-05-09-a1b2c3d4-2".to_string(),
                    kind: JobKind::Training,
                    submitted_at: Utc::now(),
                },
                training_data: "s3://bucket/data-wrangler-pipeline/07-04-05-09-a1b2c3d4/train".to_string(),
                model_artifact: ArtifactLocation::new(ARCHIVE, ArtifactRole::ModelArtifact),
            },
        )
        .unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_registers_trained_archive_under_run_name() {
        let registry = Arc::new(InMemoryModelRegistry::new());
        let stage = RegisterStage::new(registry.clone());
        let ctx = trained_context().await;

        let value = stage.execute(&ctx).await.unwrap();
        let outcome: RegisterOutcome = serde_json::from_value(value).unwrap();

        let spec = registry.get("XGBoost-Fraud-Detector-07-04-05-09-a1b2c3d4").unwrap();
        assert_eq!(spec.model_data_url, ARCHIVE);
        assert_eq!(spec.execution_role, SAMPLE_ROLE);
        assert_eq!(spec.mode, ContainerMode::SingleModel);
        assert_eq!(outcome.model.model_name, spec.model_name);
        assert_eq!(outcome.model_data_url, ARCHIVE);
    }

    #[tokio::test]
    async fn test_requires_train_output() {
        let registry = Arc::new(InMemoryModelRegistry::new());
        let stage = RegisterStage::new(registry.clone());
        let ctx = RunContext::new("ml-pipeline");
        let bundle = ConfigureStage::new(sample_params("s3://bucket/flows/claims.flow"))
            .execute(&ctx)
            .await
            .unwrap();
        ctx.record_value(StageKind::Configure, bundle).unwrap();

        let err = stage.execute(&ctx).await.unwrap_err();

        assert_eq!(err.code(), "CONFIG-MISSING-KEY");
        assert!(registry.is_empty());
    }
}
