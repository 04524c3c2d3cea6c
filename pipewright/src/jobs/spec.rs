//! Backend-agnostic job descriptions.

use super::validate_job_name;
use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// What kind of compute job a spec describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// A data processing job (the flow-graph transform).
    Processing,
    /// A model training job.
    Training,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Training => write!(f, "training"),
        }
    }
}

/// How an input location is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum S3DataType {
    /// Every object under the prefix.
    #[default]
    S3Prefix,
    /// A manifest listing the objects.
    ManifestFile,
    /// An augmented manifest.
    AugmentedManifestFile,
}

/// How input data reaches the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputMode {
    /// Downloaded before the job starts.
    #[default]
    File,
    /// Streamed while the job runs.
    Pipe,
}

/// How input data is spread across instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistributionType {
    /// Every instance receives all data.
    #[default]
    FullyReplicated,
    /// Objects are sharded by key.
    ShardedByS3Key,
}

/// When job output is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UploadMode {
    /// After the job finishes.
    #[default]
    EndOfJob,
    /// While the job runs.
    Continuous,
}

/// Format of the transform output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputContentType {
    /// Comma-separated values.
    #[default]
    Csv,
    /// Apache Parquet.
    Parquet,
}

impl fmt::Display for OutputContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "CSV"),
            Self::Parquet => write!(f, "PARQUET"),
        }
    }
}

/// Compute resources for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Number of instances.
    pub instance_count: u32,
    /// Instance type name.
    pub instance_type: String,
    /// Attached volume size.
    pub volume_size_in_gb: u32,
}

/// A location mounted into the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMount {
    /// Input (or channel) name.
    pub name: String,
    /// Where the data lives.
    pub source_uri: String,
    /// Container path, for processing jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// How the source is interpreted.
    #[serde(default)]
    pub data_type: S3DataType,
    /// How the data reaches the container.
    #[serde(default)]
    pub input_mode: InputMode,
    /// How the data is spread across instances.
    #[serde(default)]
    pub distribution: DistributionType,
    /// Content type, for training channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl InputMount {
    /// Creates an input with default data type, mode and distribution.
    #[must_use]
    pub fn new(name: impl Into<String>, source_uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_uri: source_uri.into(),
            destination: None,
            data_type: S3DataType::default(),
            input_mode: InputMode::default(),
            distribution: DistributionType::default(),
            content_type: None,
        }
    }

    /// Sets the container path.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Sets the data type, input mode and distribution.
    #[must_use]
    pub fn with_access(mut self, data_type: S3DataType, input_mode: InputMode, distribution: DistributionType) -> Self {
        self.data_type = data_type;
        self.input_mode = input_mode;
        self.distribution = distribution;
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A job output uploaded to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMount {
    /// Output name.
    pub name: String,
    /// Container path the output is read from, for processing jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Where the backend uploads the output.
    ///
    /// Backends may write below this location under a path of their choosing.
    pub destination_uri: String,
    /// When the output is uploaded.
    #[serde(default)]
    pub upload_mode: UploadMode,
}

/// A complete, backend-agnostic job request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique job name.
    pub job_name: String,
    /// Processing or training.
    pub kind: JobKind,
    /// Container image.
    pub image: String,
    /// Execution role.
    pub role: String,
    /// Compute resources.
    pub resources: ResourceConfig,
    /// Whether the container is cut off from the network.
    #[serde(default)]
    pub network_isolation: bool,
    /// Volume/output encryption key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key: Option<String>,
    /// Mounted inputs, in order.
    #[serde(default)]
    pub inputs: Vec<InputMount>,
    /// Uploaded outputs.
    #[serde(default)]
    pub outputs: Vec<OutputMount>,
    /// Container arguments.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Algorithm hyperparameters, for training jobs.
    #[serde(default)]
    pub hyperparameters: BTreeMap<String, String>,
    /// Maximum runtime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runtime_seconds: Option<u64>,
    /// Whether submission waits for a terminal status.
    #[serde(default = "default_wait")]
    pub wait: bool,
    /// Poll interval override in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_interval_seconds: Option<u64>,
}

fn default_wait() -> bool {
    true
}

impl JobSpec {
    /// Creates a spec with no inputs, outputs or arguments.
    #[must_use]
    pub fn new(
        job_name: impl Into<String>,
        kind: JobKind,
        image: impl Into<String>,
        role: impl Into<String>,
        resources: ResourceConfig,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            kind,
            image: image.into(),
            role: role.into(),
            resources,
            network_isolation: false,
            kms_key: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            arguments: Vec::new(),
            hyperparameters: BTreeMap::new(),
            max_runtime_seconds: None,
            wait: true,
            check_interval_seconds: None,
        }
    }

    /// Adds an input.
    #[must_use]
    pub fn with_input(mut self, input: InputMount) -> Self {
        self.inputs.push(input);
        self
    }

    /// Adds an output.
    #[must_use]
    pub fn with_output(mut self, output: OutputMount) -> Self {
        self.outputs.push(output);
        self
    }

    /// Adds a container argument.
    #[must_use]
    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    /// Returns the poll interval override, if any.
    #[must_use]
    pub fn check_interval(&self) -> Option<Duration> {
        self.check_interval_seconds.map(Duration::from_secs)
    }

    /// Checks the spec before it is handed to a backend.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a job name the backend would reject, a
    /// zero instance count or duplicate input names.
    pub fn validate(&self) -> Result<()> {
        validate_job_name(&self.job_name)?;

        if self.resources.instance_count == 0 {
            return Err(PipelineError::invalid_config(
                "instance_count",
                "at least one instance is required",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for input in &self.inputs {
            if !seen.insert(input.name.as_str()) {
                return Err(PipelineError::invalid_config(
                    "inputs",
                    format!("duplicate input name '{}'", input.name),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> ResourceConfig {
        ResourceConfig {
            instance_count: 1,
            instance_type: "ml.m5.2xlarge".to_string(),
            volume_size_in_gb: 5,
        }
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_value(S3DataType::S3Prefix).unwrap(), "S3Prefix");
        assert_eq!(serde_json::to_value(DistributionType::FullyReplicated).unwrap(), "FullyReplicated");
        assert_eq!(serde_json::to_value(UploadMode::EndOfJob).unwrap(), "EndOfJob");
        assert_eq!(serde_json::to_value(OutputContentType::Csv).unwrap(), "CSV");
        assert_eq!(
            serde_json::from_value::<OutputContentType>(serde_json::json!("PARQUET")).unwrap(),
            OutputContentType::Parquet
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_inputs() {
        let spec = JobSpec::new("job-1", JobKind::Processing, "img", "role", resources())
            .with_input(InputMount::new("claims", "s3://b/a.csv"))
            .with_input(InputMount::new("claims", "s3://b/b.csv"));

        assert_eq!(spec.validate().unwrap_err().code(), "CONFIG-INVALID");
    }

    #[test]
    fn test_validate_rejects_zero_instances() {
        let mut res = resources();
        res.instance_count = 0;
        let spec = JobSpec::new("job-1", JobKind::Training, "img", "role", res);

        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_name() {
        let spec = JobSpec::new("bad_name", JobKind::Training, "img", "role", resources());
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_check_interval() {
        let mut spec = JobSpec::new("job", JobKind::Training, "img", "role", resources());
        assert_eq!(spec.check_interval(), None);

        spec.check_interval_seconds = Some(30);
        assert_eq!(spec.check_interval(), Some(Duration::from_secs(30)));
    }
}
