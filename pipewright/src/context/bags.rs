//! Stage output bag.

use crate::errors::OutputConflictError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One recorded stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutputEntry {
    /// The stage's serialized result.
    pub data: serde_json::Value,
    /// When the output was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// A thread-safe bag of per-stage outputs.
///
/// Each stage records at most once per run; a second write for the same stage
/// raises `OutputConflictError`.
#[derive(Debug, Default)]
pub struct OutputBag {
    outputs: RwLock<BTreeMap<String, StageOutputEntry>>,
}

impl OutputBag {
    /// Creates a new empty output bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bag pre-populated with previously recorded entries.
    #[must_use]
    pub fn from_entries(entries: BTreeMap<String, StageOutputEntry>) -> Self {
        Self {
            outputs: RwLock::new(entries),
        }
    }

    /// Gets the output recorded for a stage.
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<serde_json::Value> {
        self.outputs.read().get(stage).map(|e| e.data.clone())
    }

    /// Gets the full entry recorded for a stage.
    #[must_use]
    pub fn get_entry(&self, stage: &str) -> Option<StageOutputEntry> {
        self.outputs.read().get(stage).cloned()
    }

    /// Checks if output exists for a stage.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.outputs.read().contains_key(stage)
    }

    /// Records the output of a stage.
    ///
    /// # Errors
    ///
    /// Returns `OutputConflictError` if the stage already recorded an output.
    pub fn set(&self, stage: impl Into<String>, data: serde_json::Value) -> Result<(), OutputConflictError> {
        let stage = stage.into();
        let mut outputs = self.outputs.write();

        if outputs.contains_key(&stage) {
            return Err(OutputConflictError::new(&stage, "Stage already recorded an output"));
        }

        outputs.insert(
            stage,
            StageOutputEntry {
                data,
                recorded_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Returns a copy of every entry.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<String, StageOutputEntry> {
        self.outputs.read().clone()
    }

    /// Returns a copy of all outputs keyed by stage name.
    #[must_use]
    pub fn to_dict(&self) -> BTreeMap<String, serde_json::Value> {
        self.outputs
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.data.clone()))
            .collect()
    }

    /// Returns the number of stages with outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.read().len()
    }

    /// Returns true if no outputs have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.read().is_empty()
    }
}

impl Clone for OutputBag {
    fn clone(&self) -> Self {
        Self::from_entries(self.entries())
    }
}
