//! Artifact locations handed from one stage to the next.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The logical role an artifact plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactRole {
    /// The declarative flow-graph document.
    FlowDefinition,
    /// A raw input dataset referenced by the flow graph.
    RawInput,
    /// Transform output relocated to its deterministic location.
    ProcessedTrainingData,
    /// The model archive produced by training.
    ModelArtifact,
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlowDefinition => write!(f, "flow-definition"),
            Self::RawInput => write!(f, "raw-input"),
            Self::ProcessedTrainingData => write!(f, "processed-training-data"),
            Self::ModelArtifact => write!(f, "model-artifact"),
        }
    }
}

/// A URI plus the role of the artifact it points at.
///
/// Produced by one stage and consumed by the next. Once relocation completes
/// the location recorded here is the only reference downstream stages use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    /// The artifact URI (`scheme://bucket/key`).
    pub uri: String,
    /// The artifact's role.
    pub role: ArtifactRole,
    /// Number of objects under the location, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_count: Option<usize>,
    /// When the location was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl ArtifactLocation {
    /// Creates a new artifact location.
    #[must_use]
    pub fn new(uri: impl Into<String>, role: ArtifactRole) -> Self {
        Self {
            uri: uri.into(),
            role,
            object_count: None,
            recorded_at: Utc::now(),
        }
    }

    /// Sets the number of objects under the location.
    #[must_use]
    pub fn with_object_count(mut self, count: usize) -> Self {
        self.object_count = Some(count);
        self
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.uri, self.role)
    }
}
