//! Configuration of the flow-graph transform job.

use super::builder::{config_map, ConfigMap, StageConfigBuilder};
use crate::context::RunToken;
use crate::errors::Result;
use crate::jobs::{DistributionType, InputMode, OutputContentType, S3DataType, UploadMode};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Floating transform container image.
pub const DEFAULT_CONTAINER_URI: &str =
    "415577184552.dkr.ecr.us-east-2.amazonaws.com/sagemaker-data-wrangler-container:1.x";

/// Pinned transform container image.
pub const PINNED_CONTAINER_URI: &str =
    "415577184552.dkr.ecr.us-east-2.amazonaws.com/sagemaker-data-wrangler-container:1.12.0";

/// Key of the nested output section.
pub const OUTPUT_SECTION: &str = "outputConfig";

/// Pipeline-level values that transform defaults depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformDefaults {
    /// Bucket used when `outputConfig.output_bucket` is not overridden.
    pub default_bucket: String,
    /// Processing instance count.
    pub instance_count: u32,
    /// Processing instance type.
    pub instance_type: String,
}

/// Where and how the transform job writes its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOutputConfig {
    /// Output format.
    pub output_content_type: OutputContentType,
    /// Output bucket.
    pub output_bucket: String,
    /// Key prefix inside the bucket; the run token when unset.
    #[serde(default)]
    pub output_prefix: Option<String>,
}

impl TransformOutputConfig {
    /// The prefix the job uploads below.
    #[must_use]
    pub fn effective_prefix(&self, token: &RunToken) -> String {
        self.output_prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map_or_else(|| token.to_string(), str::to_string)
    }

    /// The run-scoped prefix that relocated output is written to.
    #[must_use]
    pub fn run_namespace(&self, token: &RunToken) -> String {
        match self.output_prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{token}"),
            _ => token.to_string(),
        }
    }
}

/// Resolved configuration of the transform job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Role the job runs under.
    pub sagemaker_role: String,
    /// How inputs are interpreted.
    pub s3_data_type: S3DataType,
    /// How inputs reach the container.
    pub s3_input_mode: InputMode,
    /// How inputs are spread across instances.
    pub s3_data_distribution_type: DistributionType,
    /// Encryption key for volumes and output.
    #[serde(default)]
    pub kms_key: Option<String>,
    /// Volume size per instance.
    pub volume_size_in_gb: u32,
    /// Whether the container is cut off from the network.
    pub enable_network_isolation: bool,
    /// Whether submission blocks until the job ends.
    pub wait_for_processing: bool,
    /// Floating container image.
    pub container_uri: String,
    /// Pinned container image.
    pub container_uri_pinned: String,
    /// Whether to run the pinned image.
    pub use_pinned_container: bool,
    /// When output is uploaded.
    pub s3_output_upload_mode: UploadMode,
    /// Processing instance count.
    pub instance_count: u32,
    /// Processing instance type.
    pub instance_type: String,
    /// Output location and format.
    #[serde(rename = "outputConfig")]
    pub output: TransformOutputConfig,
}

impl TransformConfig {
    /// Builds the resolver for transform overrides.
    #[must_use]
    pub fn builder(defaults: &TransformDefaults) -> StageConfigBuilder {
        StageConfigBuilder::new(config_map(json!({
            "s3_data_type": "S3Prefix",
            "s3_input_mode": "File",
            "s3_data_distribution_type": "FullyReplicated",
            "kms_key": null,
            "volume_size_in_gb": 30,
            "enable_network_isolation": false,
            "wait_for_processing": true,
            "container_uri": DEFAULT_CONTAINER_URI,
            "container_uri_pinned": PINNED_CONTAINER_URI,
            "use_pinned_container": false,
            "s3_output_upload_mode": "EndOfJob",
            "instance_count": defaults.instance_count,
            "instance_type": defaults.instance_type,
        })))
        .with_section(
            OUTPUT_SECTION,
            config_map(json!({
                "output_content_type": "CSV",
                "output_bucket": defaults.default_bucket,
                "output_prefix": null,
            })),
        )
        .require("sagemaker_role")
    }

    /// Resolves overrides into a transform configuration.
    ///
    /// # Errors
    ///
    /// Returns `MissingSection` without an `outputConfig` section,
    /// `MissingKey` without a role and `InvalidConfig` for values of the
    /// wrong type.
    pub fn resolve(overrides: &ConfigMap, defaults: &TransformDefaults) -> Result<Self> {
        Self::builder(defaults).resolve_into(overrides)
    }

    /// The image the job runs.
    #[must_use]
    pub fn image(&self) -> &str {
        if self.use_pinned_container {
            &self.container_uri_pinned
        } else {
            &self.container_uri
        }
    }
}
