use super::{Stage, TRACING_TARGET};
use crate::config::{PipelineConfigBundle, PipelineParams};
use crate::context::RunContext;
use crate::core::StageKind;
use crate::errors::Result;
use async_trait::async_trait;

/// Resolves the run's [`PipelineConfigBundle`].
#[derive(Debug, Clone)]
pub struct ConfigureStage {
    params: PipelineParams,
}

impl ConfigureStage {
    /// Creates the stage over operator parameters.
    #[must_use]
    pub fn new(params: PipelineParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl Stage for ConfigureStage {
    fn kind(&self) -> StageKind {
        StageKind::Configure
    }

    async fn execute(&self, ctx: &RunContext) -> Result<serde_json::Value> {
        let bundle = PipelineConfigBundle::resolve(&self.params, ctx.token())?;
        tracing::debug!(
            target: TRACING_TARGET,
            run_id = %ctx.run_id(),
            flow_uri = %bundle.flow_uri,
            "Resolved run configuration"
        );
        Ok(serde_json::to_value(bundle)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunToken;

    #[tokio::test]
    async fn test_output_decodes_as_bundle() {
        let ctx = RunContext::with_token("p", RunToken::from_existing("07-04-05-09-a1b2c3d4"));
        let stage = ConfigureStage::new(PipelineParams::new("arn:role", "b", "s3://b/f.flow"));

        let value = stage.execute(&ctx).await.unwrap();
        let bundle: PipelineConfigBundle = serde_json::from_value(value).unwrap();

        assert_eq!(bundle.run_id, ctx.run_id());
        assert_eq!(stage.name(), "start");
    }

    #[tokio::test]
    async fn test_invalid_params_fail() {
        let ctx = RunContext::new("p");
        let stage = ConfigureStage::new(PipelineParams::new("arn:role", "b", "flow-without-scheme"));

        assert!(stage.execute(&ctx).await.is_err());
    }
}
