//! Pipeline-level parameters supplied by the operator.

use super::builder::ConfigMap;
use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Operator-supplied parameters for a pipeline.
///
/// Loaded once per deployment and turned into a per-run
/// [`PipelineConfigBundle`](super::PipelineConfigBundle) by the configure stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Name used in logs and events.
    #[serde(default = "default_pipeline_name")]
    pub pipeline_name: String,
    /// Execution role for every job.
    pub role: String,
    /// Backend region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Bucket used when no explicit bucket is set.
    pub default_bucket: String,
    /// Explicit bucket for pipeline data.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Key prefix for pipeline data.
    #[serde(default = "default_s3_prefix")]
    pub s3_prefix: String,
    /// URI scheme of generated locations.
    #[serde(default = "default_storage_scheme")]
    pub storage_scheme: String,
    /// Location of the flow-graph document.
    pub flow_uri: String,
    /// Processing instance count.
    #[serde(default = "default_processing_instance_count")]
    pub processing_instance_count: u32,
    /// Processing instance type.
    #[serde(default = "default_processing_instance_type")]
    pub processing_instance_type: String,
    /// Training and serving image; derived from the region when unset.
    #[serde(default)]
    pub algorithm_image: Option<String>,
    /// Transform config overrides.
    #[serde(default)]
    pub transform: ConfigMap,
    /// Training config overrides.
    #[serde(default)]
    pub training: ConfigMap,
    /// Model config overrides.
    #[serde(default)]
    pub model: ConfigMap,
}

fn default_pipeline_name() -> String {
    "ml-pipeline".to_string()
}

fn default_region() -> String {
    "us-east-2".to_string()
}

fn default_s3_prefix() -> String {
    "data-wrangler-pipeline".to_string()
}

fn default_storage_scheme() -> String {
    "s3".to_string()
}

fn default_processing_instance_count() -> u32 {
    2
}

fn default_processing_instance_type() -> String {
    "ml.m5.4xlarge".to_string()
}

impl PipelineParams {
    /// Creates parameters with defaults for everything optional.
    #[must_use]
    pub fn new(role: impl Into<String>, default_bucket: impl Into<String>, flow_uri: impl Into<String>) -> Self {
        Self {
            pipeline_name: default_pipeline_name(),
            role: role.into(),
            region: default_region(),
            default_bucket: default_bucket.into(),
            bucket: None,
            s3_prefix: default_s3_prefix(),
            storage_scheme: default_storage_scheme(),
            flow_uri: flow_uri.into(),
            processing_instance_count: default_processing_instance_count(),
            processing_instance_type: default_processing_instance_type(),
            algorithm_image: None,
            transform: ConfigMap::new(),
            training: ConfigMap::new(),
            model: ConfigMap::new(),
        }
    }

    /// Sets the pipeline name.
    #[must_use]
    pub fn with_pipeline_name(mut self, name: impl Into<String>) -> Self {
        self.pipeline_name = name.into();
        self
    }

    /// Sets an explicit bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Sets the data prefix.
    #[must_use]
    pub fn with_s3_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.s3_prefix = prefix.into();
        self
    }

    /// Sets the URI scheme of generated locations.
    #[must_use]
    pub fn with_storage_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.storage_scheme = scheme.into();
        self
    }

    /// Sets the algorithm image.
    #[must_use]
    pub fn with_algorithm_image(mut self, image: impl Into<String>) -> Self {
        self.algorithm_image = Some(image.into());
        self
    }

    /// Sets one transform override.
    #[must_use]
    pub fn with_transform_override(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.transform.insert(key.into(), value);
        self
    }

    /// Sets one training override.
    #[must_use]
    pub fn with_training_override(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.training.insert(key.into(), value);
        self
    }

    /// Parses parameters from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the text is not valid parameters JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PipelineError::invalid_config("params", e.to_string()))
    }

    /// Reads parameters from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `InvalidConfig` if it is
    /// not valid parameters JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Checks the parameters once, before any run starts.
    ///
    /// # Errors
    ///
    /// Returns `MissingKey` for an empty required value and `InvalidConfig`
    /// for an unusable one.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("role", &self.role),
            ("default_bucket", &self.default_bucket),
            ("flow_uri", &self.flow_uri),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::missing_key(key));
            }
        }

        crate::storage::StorageUri::parse(&self.flow_uri)
            .map_err(|e| PipelineError::invalid_config("flow_uri", e.to_string()))?;

        if self.processing_instance_count == 0 {
            return Err(PipelineError::invalid_config(
                "processing_instance_count",
                "at least one instance is required",
            ));
        }

        if self.storage_scheme.is_empty() || self.storage_scheme.contains("://") {
            return Err(PipelineError::invalid_config(
                "storage_scheme",
                format!("'{}' is not a URI scheme", self.storage_scheme),
            ));
        }

        Ok(())
    }

    /// The bucket pipeline data lives in.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.bucket.as_deref().unwrap_or(&self.default_bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_json_str_applies_defaults() {
        let params = PipelineParams::from_json_str(
            r#"{"role": "arn:role", "default_bucket": "sm-default", "flow_uri": "s3://b/flows/claims.flow"}"#,
        )
        .unwrap();

        assert_eq!(params.region, "us-east-2");
        assert_eq!(params.s3_prefix, "data-wrangler-pipeline");
        assert_eq!(params.processing_instance_count, 2);
        assert_eq!(params.processing_instance_type, "ml.m5.4xlarge");
        assert_eq!(params.bucket(), "sm-default");
        params.validate().unwrap();
    }

    #[test]
    fn test_missing_required_field() {
        let err = PipelineParams::from_json_str(r#"{"role": "arn:role"}"#).unwrap_err();
        assert_eq!(err.code(), "CONFIG-INVALID");
    }

    #[test]
    fn test_validate() {
        let params = PipelineParams::new("", "b", "s3://b/f.flow");
        assert_eq!(params.validate().unwrap_err().code(), "CONFIG-MISSING-KEY");

        let params = PipelineParams::new("r", "b", "no-scheme");
        assert_eq!(params.validate().unwrap_err().code(), "CONFIG-INVALID");
    }

    #[test]
    fn test_explicit_bucket_wins() {
        let params = PipelineParams::new("r", "default", "s3://b/f.flow").with_bucket("mine");
        assert_eq!(params.bucket(), "mine");
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"role": "r", "default_bucket": "b", "flow_uri": "s3://b/f.flow", "transform": {{"volume_size_in_gb": 50}}}}"#
        )
        .unwrap();

        let params = PipelineParams::from_json_file(file.path()).unwrap();
        assert_eq!(params.transform["volume_size_in_gb"], 50);
    }
}
