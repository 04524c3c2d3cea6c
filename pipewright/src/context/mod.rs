//! Run context passed between pipeline stages.
//!
//! This module provides:
//! - [`RunToken`]: the per-run uniqueness token
//! - [`OutputBag`]: write-once per-stage outputs
//! - [`RunContext`]: everything a stage needs to know about its run
//! - [`ContextSnapshot`]: the serializable form exchanged with schedulers

mod bags;
mod execution;
mod identity;
mod snapshot;

pub use bags::{OutputBag, StageOutputEntry};
pub use execution::RunContext;
pub use identity::RunToken;
pub use snapshot::ContextSnapshot;
