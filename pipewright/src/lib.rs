//! # Pipewright
//!
//! Coordination core for a three-job data pipeline: a flow-graph driven
//! **transform** job, a **train** job over its output, and a **register**
//! step publishing the resulting model.
//!
//! Pipewright provides:
//!
//! - **Per-run configuration**: defaults-else-overrides resolution into typed stage configs
//! - **Flow-graph parsing**: job inputs and the output descriptor from a stored graph
//! - **Job execution**: submit, poll and cancel over a pluggable compute backend
//! - **Deterministic artifacts**: relocation of job output to run-namespaced locations
//! - **Coordination**: a run state machine with structured failures for the scheduler
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipewright::prelude::*;
//!
//! let coordinator = PipelineCoordinator::new(params, store, runner, registry);
//! let ctx = RunContext::new("ml-pipeline");
//!
//! let run = coordinator.run(&ctx).await?;
//! println!("training data at {:?}", run.training_data());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod flow;
pub mod jobs;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod storage;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{PipelineConfigBundle, PipelineParams, StageConfigBuilder};
    pub use crate::context::{ContextSnapshot, RunContext, RunToken};
    pub use crate::core::{ArtifactLocation, ArtifactRole, JobStatus, StageKind, StorageUri};
    pub use crate::errors::{OutputConflictError, PipelineError, Result};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::flow::{parse_flow, FlowDocument, ParsedFlow};
    pub use crate::jobs::{
        InMemoryJobRunner, InMemoryModelRegistry, JobHandle, JobRunner, JobSpec, ModelRegistry,
    };
    pub use crate::pipeline::{PipelineCoordinator, PipelineRun, PipelineState, RunFailure, Stage};
    pub use crate::storage::{ArtifactStore, InMemoryArtifactStore, LocalArtifactStore};
}
