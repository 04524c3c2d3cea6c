//! Core domain model types for pipewright.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage kinds and backend job statuses
//! - Artifact locations passed between stages

mod artifact;
mod status;

pub use artifact::{ArtifactLocation, ArtifactRole};
pub use status::{JobStatus, StageKind, TerminalStatus};

pub use crate::storage::StorageUri;
