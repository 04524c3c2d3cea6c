//! Object-storage contract, adapters and deterministic output relocation.
//!
//! This module provides:
//! - The [`ArtifactStore`] trait over `scheme://bucket/key` URIs
//! - In-memory and local-filesystem adapters
//! - The relocation algorithm run after each transform job

mod error;
mod local;
mod memory;
mod relocation;
mod store;
mod uri;

pub use error::{StorageError, StorageResult};
pub use local::LocalArtifactStore;
pub use memory::InMemoryArtifactStore;
pub use relocation::{relocate, RelocatedObject, RelocationPlan, RelocationReport};
pub use store::ArtifactStore;
pub use uri::StorageUri;

/// Tracing target for storage operations.
pub const TRACING_TARGET: &str = "pipewright::storage";
