//! Configuration of the training job and the published model.

use super::builder::{config_map, ConfigMap, StageConfigBuilder};
use crate::context::RunToken;
use crate::errors::{PipelineError, Result};
use crate::jobs::{ContainerMode, DistributionType, InputMode, ResourceConfig, S3DataType};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// Registry accounts hosting the built-in gradient-boosting image, by region.
const XGBOOST_ACCOUNTS: &[(&str, &str)] = &[
    ("us-east-1", "683313688378"),
    ("us-east-2", "257758044811"),
    ("us-west-1", "746614075791"),
    ("us-west-2", "246618743249"),
    ("eu-west-1", "141502667606"),
    ("eu-central-1", "492215442770"),
    ("ap-northeast-1", "354813040037"),
    ("ap-southeast-2", "783357654285"),
];

/// Returns the built-in gradient-boosting training image for a region.
///
/// # Errors
///
/// Returns `InvalidConfig` for a region without a known image.
pub fn xgboost_image_uri(region: &str) -> Result<String> {
    XGBOOST_ACCOUNTS
        .iter()
        .find(|(r, _)| *r == region)
        .map(|(_, account)| format!("{account}.dkr.ecr.{region}.amazonaws.com/sagemaker-xgboost:1.0-1-cpu-py3"))
        .ok_or_else(|| PipelineError::invalid_config("region", format!("no training image known for '{region}'")))
}

/// Pipeline-level values that training and model defaults depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingDefaults {
    /// Algorithm image.
    pub image: String,
    /// Execution role.
    pub role: String,
    /// Where relocated training data is expected.
    pub input_uri: String,
    /// Where the job writes model archives.
    pub output_path: String,
}

/// The training algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Training image.
    pub training_image: String,
    /// How data reaches the container.
    #[serde(default)]
    pub training_input_mode: InputMode,
}

/// The training data channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name seen by the algorithm.
    #[serde(default = "default_channel_name")]
    pub channel_name: String,
    /// Content type of the channel data.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// How the source is interpreted.
    #[serde(default)]
    pub data_type: S3DataType,
    /// How data is spread across instances.
    #[serde(default)]
    pub distribution: DistributionType,
    /// Fallback data location, used when no transform output was recorded.
    pub input_uri: String,
}

fn default_channel_name() -> String {
    "train".to_string()
}

fn default_content_type() -> String {
    "csv".to_string()
}

/// Resolved configuration of the training job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Job name prefix; the run token and sequence are appended.
    pub job_name_prefix: String,
    /// The algorithm.
    pub algorithm: AlgorithmConfig,
    /// Algorithm hyperparameters.
    pub hyperparameters: BTreeMap<String, String>,
    /// The training channel.
    pub channel: ChannelConfig,
    /// Where model archives are written.
    pub output_path: String,
    /// Compute resources.
    pub resources: ResourceConfig,
    /// Role the job runs under.
    pub role: String,
    /// Stopping condition.
    pub max_runtime_seconds: u64,
    /// Whether submission blocks until the job ends.
    pub wait_for_completion: bool,
    /// Seconds between status polls.
    pub check_interval_seconds: u64,
}

impl TrainingConfig {
    /// Builds the resolver for training overrides.
    #[must_use]
    pub fn builder(defaults: &TrainingDefaults) -> StageConfigBuilder {
        StageConfigBuilder::new(config_map(json!({
            "job_name_prefix": "XGBoost-training",
            "algorithm": {
                "training_image": defaults.image,
                "training_input_mode": "File"
            },
            "hyperparameters": {
                "max_depth": "5",
                "num_round": "10",
                "objective": "reg:squarederror"
            },
            "channel": {
                "channel_name": "train",
                "content_type": "csv",
                "data_type": "S3Prefix",
                "distribution": "FullyReplicated",
                "input_uri": defaults.input_uri
            },
            "output_path": defaults.output_path,
            "resources": {
                "instance_count": 1,
                "instance_type": "ml.m5.2xlarge",
                "volume_size_in_gb": 5
            },
            "role": defaults.role,
            "max_runtime_seconds": 86_400,
            "wait_for_completion": true,
            "check_interval_seconds": 30
        })))
        .require("role")
    }

    /// Resolves training overrides.
    ///
    /// Overrides replace top-level keys whole; overriding `hyperparameters`
    /// replaces every hyperparameter.
    ///
    /// # Errors
    ///
    /// Returns `MissingKey` without a role and `InvalidConfig` for values of
    /// the wrong type.
    pub fn resolve(overrides: &ConfigMap, defaults: &TrainingDefaults) -> Result<Self> {
        Self::builder(defaults).resolve_into(overrides)
    }

    /// Where the archive of `job_name` will be written.
    #[must_use]
    pub fn model_data_url(&self, job_name: &str) -> String {
        format!("{}/{job_name}/output/model.tar.gz", self.output_path.trim_end_matches('/'))
    }
}

/// Resolved configuration of the published model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name prefix; the run token is appended.
    pub model_name_prefix: String,
    /// Serving image.
    pub image: String,
    /// Hosting mode.
    pub mode: ContainerMode,
    /// Role the model executes under.
    pub execution_role: String,
}

impl ModelConfig {
    /// Resolves model overrides.
    ///
    /// # Errors
    ///
    /// Returns `MissingKey` without a role and `InvalidConfig` for values of
    /// the wrong type.
    pub fn resolve(overrides: &ConfigMap, defaults: &TrainingDefaults) -> Result<Self> {
        StageConfigBuilder::new(config_map(json!({
            "model_name_prefix": "XGBoost-Fraud-Detector",
            "image": defaults.image,
            "mode": "SingleModel",
            "execution_role": defaults.role
        })))
        .require("execution_role")
        .resolve_into(overrides)
    }

    /// The model name for a run.
    #[must_use]
    pub fn model_name(&self, token: &RunToken) -> String {
        format!("{}-{token}", self.model_name_prefix)
    }
}
