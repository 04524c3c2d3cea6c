//! The per-run configuration bundle produced by the configure stage.

use super::{
    xgboost_image_uri, ConfigMap, ModelConfig, PipelineParams, TrainingConfig, TrainingDefaults,
    TransformConfig, TransformDefaults, OUTPUT_SECTION,
};
use crate::context::RunToken;
use crate::errors::{PipelineError, Result};
use crate::storage::StorageUri;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything the later stages need to know about their configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfigBundle {
    /// The run this bundle belongs to.
    pub run_id: String,
    /// Location of the flow-graph document.
    pub flow_uri: String,
    /// URI scheme of generated locations.
    pub storage_scheme: String,
    /// Transform job configuration.
    pub transform: TransformConfig,
    /// Training job configuration.
    pub training: TrainingConfig,
    /// Published model configuration.
    pub model: ModelConfig,
}

impl PipelineConfigBundle {
    /// Resolves every stage configuration for one run.
    ///
    /// Deterministic for a given `params` and `token`.
    ///
    /// # Errors
    ///
    /// Returns any configuration error raised by validation or resolution.
    pub fn resolve(params: &PipelineParams, token: &RunToken) -> Result<Self> {
        params.validate()?;

        let image = match &params.algorithm_image {
            Some(image) => image.clone(),
            None => xgboost_image_uri(&params.region)?,
        };

        let transform = TransformConfig::resolve(
            &transform_overrides(params)?,
            &TransformDefaults {
                default_bucket: params.bucket().to_string(),
                instance_count: params.processing_instance_count,
                instance_type: params.processing_instance_type.clone(),
            },
        )?;

        let namespace = StorageUri::new(
            params.storage_scheme.clone(),
            params.bucket(),
            format!("{}/{token}", params.s3_prefix.trim_matches('/')),
        );
        let training_defaults = TrainingDefaults {
            image,
            role: params.role.clone(),
            input_uri: namespace.join("train").to_string(),
            output_path: namespace.join("xgboost").to_string(),
        };

        Ok(Self {
            run_id: token.to_string(),
            flow_uri: params.flow_uri.clone(),
            storage_scheme: params.storage_scheme.clone(),
            transform,
            training: TrainingConfig::resolve(&params.training, &training_defaults)?,
            model: ModelConfig::resolve(&params.model, &training_defaults)?,
        })
    }
}

/// Layers the operator's transform overrides over the pipeline role and prefix.
fn transform_overrides(params: &PipelineParams) -> Result<ConfigMap> {
    let mut overrides = ConfigMap::new();
    overrides.insert("sagemaker_role".to_string(), Value::String(params.role.clone()));

    let mut output = ConfigMap::new();
    output.insert("output_prefix".to_string(), Value::String(params.s3_prefix.clone()));

    for (key, value) in &params.transform {
        if key == OUTPUT_SECTION {
            let section = value
                .as_object()
                .ok_or_else(|| PipelineError::invalid_config(OUTPUT_SECTION, "expected an object"))?;
            output.extend(section.iter().map(|(k, v)| (k.clone(), v.clone())));
        } else {
            overrides.insert(key.clone(), value.clone());
        }
    }

    overrides.insert(OUTPUT_SECTION.to_string(), Value::Object(output));
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params() -> PipelineParams {
        PipelineParams::new("arn:role", "sm-default", "s3://sm-default/flows/claims.flow")
    }

    #[test]
    fn test_bundle_is_run_scoped() {
        let token = RunToken::from_existing("07-04-05-09-a1b2c3d4");
        let bundle = PipelineConfigBundle::resolve(&params(), &token).unwrap();

        assert_eq!(bundle.run_id, "07-04-05-09-a1b2c3d4");
        assert_eq!(bundle.transform.sagemaker_role, "arn:role");
        assert_eq!(bundle.transform.output.output_prefix.as_deref(), Some("data-wrangler-pipeline"));
        assert_eq!(
            bundle.training.channel.input_uri,
            "s3://sm-default/data-wrangler-pipeline/07-04-05-09-a1b2c3d4/train"
        );
        assert_eq!(
            bundle.training.output_path,
            "s3://sm-default/data-wrangler-pipeline/07-04-05-09-a1b2c3d4/xgboost"
        );
        assert_eq!(bundle.model.execution_role, "arn:role");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let token = RunToken::from_existing("07-04-05-09-a1b2c3d4");
        assert_eq!(
            PipelineConfigBundle::resolve(&params(), &token).unwrap(),
            PipelineConfigBundle::resolve(&params(), &token).unwrap()
        );
    }

    #[test]
    fn test_operator_overrides_merge_into_output_section() {
        let params = params()
            .with_transform_override("volume_size_in_gb", json!(50))
            .with_transform_override("outputConfig", json!({"output_content_type": "PARQUET"}));
        let bundle = PipelineConfigBundle::resolve(&params, &RunToken::generate()).unwrap();

        assert_eq!(bundle.transform.volume_size_in_gb, 50);
        assert_eq!(bundle.transform.output.output_prefix.as_deref(), Some("data-wrangler-pipeline"));
        assert_eq!(bundle.transform.output.output_content_type.to_string(), "PARQUET");
    }

    #[test]
    fn test_explicit_image_skips_region_lookup() {
        let mut params = params().with_algorithm_image("registry.local/xgboost:latest");
        params.region = "mars-1".to_string();

        let bundle = PipelineConfigBundle::resolve(&params, &RunToken::generate()).unwrap();
        assert_eq!(bundle.model.image, "registry.local/xgboost:latest");
    }
}
