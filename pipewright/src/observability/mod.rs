//! Tracing setup and run spans.
//!
//! The core only emits `tracing` events; installing a subscriber is left to
//! the host process. [`init_tracing`] is a convenience for binaries and demos.

use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Error returned when a global subscriber is already installed.
pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Installs a global `fmt` subscriber.
///
/// The filter is read from `RUST_LOG`, falling back to `info`. With `json`
/// set, each event is written as one JSON object per line.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init_tracing(json: bool) -> Result<(), InitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    }
}

/// Creates the span a pipeline run executes in.
#[must_use]
pub fn run_span(pipeline: &str, run_id: &str) -> Span {
    tracing::info_span!("pipeline_run", pipeline = %pipeline, run_id = %run_id)
}

/// Creates the span a single stage executes in.
#[must_use]
pub fn stage_span(run_id: &str, stage: &str) -> Span {
    tracing::info_span!("stage", run_id = %run_id, stage = %stage)
}
