//! Compute jobs and model registration.
//!
//! This module provides:
//! - [`JobSpec`]: a backend-agnostic job request
//! - [`JobRunner`]: the compute-backend port, with submit-and-wait built in
//! - [`ModelRegistry`]: the model publication port
//! - In-memory adapters for both ports

mod memory;
mod naming;
mod registry;
mod runner;
mod spec;

pub use memory::{InMemoryJobRunner, JobBehavior};
pub use naming::{job_name, validate_job_name, MAX_JOB_NAME_LEN};
pub use registry::{ContainerMode, InMemoryModelRegistry, ModelHandle, ModelRegistry, ModelSpec};
pub use runner::{JobHandle, JobOutcome, JobProgress, JobRunner, Submission, DEFAULT_POLL_INTERVAL};
pub use spec::{
    DistributionType, InputMode, InputMount, JobKind, JobSpec, OutputContentType, OutputMount,
    ResourceConfig, S3DataType, UploadMode,
};

/// Tracing target for job operations.
pub const TRACING_TARGET: &str = "pipewright::jobs";
