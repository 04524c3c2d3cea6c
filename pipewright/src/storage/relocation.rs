//! Deterministic relocation of backend-produced outputs.
//!
//! The compute backend writes job outputs under a sub-path it chooses
//! itself. Relocation copies every object found under the job's prefix to a
//! pipeline-owned location with predictable names, then removes the
//! originals, so the next stage can find its input without knowing how the
//! backend laid it out.

use super::{ArtifactStore, StorageUri, TRACING_TARGET};
use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to relocate and where to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationPlan {
    /// URI of the backend output prefix, e.g. `s3://bucket/prefix/job-name`.
    pub source: StorageUri,
    /// The deterministic destination directory.
    pub destination: StorageUri,
    /// File stem of relocated objects.
    pub file_stem: String,
    /// File extension of relocated objects.
    pub extension: String,
}

impl RelocationPlan {
    /// Creates a plan producing `train-data-{i}.csv` objects.
    #[must_use]
    pub fn new(source: StorageUri, destination: StorageUri) -> Self {
        Self {
            source,
            destination,
            file_stem: "train-data".to_string(),
            extension: "csv".to_string(),
        }
    }

    /// Overrides the file stem and extension.
    #[must_use]
    pub fn with_naming(mut self, stem: impl Into<String>, extension: impl Into<String>) -> Self {
        self.file_stem = stem.into();
        self.extension = extension.into();
        self
    }

    /// Destination URI of the object at position `index`.
    #[must_use]
    pub fn destination_for(&self, index: usize) -> StorageUri {
        self.destination
            .join(&format!("{}-{index}.{}", self.file_stem, self.extension))
    }
}

/// One relocated object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocatedObject {
    /// The original key in the source bucket.
    pub source_key: String,
    /// Where the object now lives.
    pub destination: String,
}

/// The result of a completed relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationReport {
    /// The relocated source prefix.
    pub source: String,
    /// The destination directory.
    pub destination: String,
    /// Relocated objects, in listing order.
    pub objects: Vec<RelocatedObject>,
}

impl RelocationReport {
    /// True if the source prefix held no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of relocated objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }
}

/// Moves every object under `plan.source` to `plan.destination`.
///
/// Objects are numbered by their position in the listing. Originals are
/// deleted only after every copy succeeded. If any copy fails, the copies
/// already made by this call are removed again, nothing is deleted from the
/// source and a `Relocation` error is returned.
///
/// An empty source prefix is not an error here; the returned report is empty
/// and the consuming stage decides whether it can proceed.
pub async fn relocate(store: &dyn ArtifactStore, plan: &RelocationPlan) -> Result<RelocationReport> {
    let source = plan.source.to_string();
    let keys = store.list(&plan.source.bucket, &plan.source.key).await?;

    let mut report = RelocationReport {
        source: source.clone(),
        destination: plan.destination.to_string(),
        objects: Vec::with_capacity(keys.len()),
    };

    if keys.is_empty() {
        tracing::warn!(
            target: TRACING_TARGET,
            source = %source,
            "No objects to relocate"
        );
        return Ok(report);
    }

    for (index, key) in keys.iter().enumerate() {
        let src = plan.source.with_key(key.clone()).to_string();
        let dst = plan.destination_for(index);

        if let Err(e) = store.copy(&src, &dst.to_string()).await {
            rollback_copies(store, &report.objects).await;
            return Err(PipelineError::relocation(
                &source,
                format!("copy of '{key}' failed after {index} of {} objects: {e}", keys.len()),
            ));
        }

        tracing::debug!(target: TRACING_TARGET, from = %src, to = %dst, "Relocated object");
        report.objects.push(RelocatedObject {
            source_key: key.clone(),
            destination: dst.to_string(),
        });
    }

    store
        .delete(&plan.source.bucket, &keys)
        .await
        .map_err(|e| {
            PipelineError::relocation(&source, format!("copies complete but originals not removed: {e}"))
        })?;

    tracing::info!(
        target: TRACING_TARGET,
        source = %source,
        destination = %report.destination,
        objects = report.len(),
        "Relocation complete"
    );

    Ok(report)
}

async fn rollback_copies(store: &dyn ArtifactStore, copied: &[RelocatedObject]) {
    let mut by_bucket: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for object in copied {
        match StorageUri::parse(&object.destination) {
            Ok(uri) => by_bucket.entry(uri.bucket).or_default().push(uri.key),
            Err(e) => tracing::warn!(target: TRACING_TARGET, error = %e, "Unparseable copy destination"),
        }
    }

    for (bucket, keys) in by_bucket {
        if let Err(e) = store.delete(&bucket, &keys).await {
            tracing::warn!(
                target: TRACING_TARGET,
                bucket = %bucket,
                keys = ?keys,
                error = %e,
                "Failed to remove partial relocation copies"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryArtifactStore;
    use pretty_assertions::assert_eq;

    fn plan() -> RelocationPlan {
        RelocationPlan::new(
            StorageUri::parse("s3://out/prefix/processing-job").unwrap(),
            StorageUri::parse("s3://out/prefix/run-1/train").unwrap(),
        )
    }

    async fn seed(store: &InMemoryArtifactStore, parts: &[&str]) {
        for part in parts {
            store
                .put(&format!("s3://out/prefix/processing-job/{part}"), part.as_bytes().to_vec())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_relocates_three_keys() {
        let store = InMemoryArtifactStore::new();
        seed(&store, &["a/part-0", "a/part-1", "b/part-0"]).await;

        let report = relocate(&store, &plan()).await.unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(
            store.keys("out"),
            vec![
                "prefix/run-1/train/train-data-0.csv".to_string(),
                "prefix/run-1/train/train-data-1.csv".to_string(),
                "prefix/run-1/train/train-data-2.csv".to_string(),
            ]
        );
        assert_eq!(
            store.read("s3://out/prefix/run-1/train/train-data-2.csv").await.unwrap(),
            b"b/part-0"
        );
        assert_eq!(store.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_source_is_not_an_error() {
        let store = InMemoryArtifactStore::new();

        let report = relocate(&store, &plan()).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(store.delete_calls(), 0);
    }

    #[tokio::test]
    async fn test_copy_failure_deletes_nothing_and_leaves_no_copies() {
        let store = InMemoryArtifactStore::new();
        seed(&store, &["part-0", "part-1", "part-2"]).await;
        store.fail_copies_matching("part-2");

        let err = relocate(&store, &plan()).await.unwrap_err();

        assert_eq!(err.code(), "ARTIFACT-RELOCATION");
        assert_eq!(store.list("out", "prefix/processing-job").await.unwrap().len(), 3);
        assert!(store.list("out", "prefix/run-1/train").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_failure_is_reported() {
        let store = InMemoryArtifactStore::new();
        seed(&store, &["part-0"]).await;
        store.fail_deletes(true);

        let err = relocate(&store, &plan()).await.unwrap_err();
        assert!(err.to_string().contains("originals not removed"));
    }

    #[test]
    fn test_custom_naming() {
        let plan = plan().with_naming("validation", "parquet");
        assert_eq!(
            plan.destination_for(4).to_string(),
            "s3://out/prefix/run-1/train/validation-4.parquet"
        );
    }
}
