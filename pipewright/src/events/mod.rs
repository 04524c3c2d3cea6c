//! Pipeline lifecycle events.
//!
//! The coordinator reports every run and stage transition to an
//! [`EventSink`]. Event names are listed in [`names`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names emitted by the coordinator.
pub mod names {
    /// A run began.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A run reached `Done`.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A run reached `Failed`.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    /// A stage was dispatched.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage recorded its output.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage raised an error.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// Transform output was moved to its deterministic location.
    pub const ARTIFACT_RELOCATED: &str = "artifact.relocated";
}
