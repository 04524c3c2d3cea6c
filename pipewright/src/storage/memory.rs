//! In-process object store.

use super::{ArtifactStore, StorageError, StorageResult, StorageUri, TRACING_TARGET};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

type Buckets = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// An object store held in memory.
///
/// Keys are listed in lexicographic order, matching how S3-style backends
/// page results. Copy and delete failures can be injected for testing
/// relocation behaviour.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    buckets: RwLock<Buckets>,
    fail_copy_matching: RwLock<Option<String>>,
    fail_deletes: AtomicBool,
    copy_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every copy whose source URI contains `pattern` fail.
    pub fn fail_copies_matching(&self, pattern: impl Into<String>) {
        *self.fail_copy_matching.write() = Some(pattern.into());
    }

    /// Makes every delete call fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Clears injected failures.
    pub fn clear_failures(&self) {
        *self.fail_copy_matching.write() = None;
        self.fail_deletes.store(false, Ordering::SeqCst);
    }

    /// Returns true if the object exists.
    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        StorageUri::parse(uri).is_ok_and(|uri| {
            self.buckets
                .read()
                .get(&uri.bucket)
                .is_some_and(|objects| objects.contains_key(&uri.key))
        })
    }

    /// Returns every key in a bucket.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the total number of stored objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.buckets.read().values().map(BTreeMap::len).sum()
    }

    /// Number of copy calls made so far, including failed ones.
    #[must_use]
    pub fn copy_calls(&self) -> usize {
        self.copy_calls.load(Ordering::SeqCst)
    }

    /// Number of delete calls made so far, including failed ones.
    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn read(&self, uri: &str) -> StorageResult<Vec<u8>> {
        let parsed = StorageUri::parse(uri)?;
        self.buckets
            .read()
            .get(&parsed.bucket)
            .and_then(|objects| objects.get(&parsed.key))
            .cloned()
            .ok_or_else(|| StorageError::not_found(uri))
    }

    async fn put(&self, uri: &str, data: Vec<u8>) -> StorageResult<()> {
        let parsed = StorageUri::parse(uri)?;
        if parsed.key.is_empty() {
            return Err(StorageError::write(format!("{uri}: empty key")));
        }

        tracing::trace!(target: TRACING_TARGET, uri = %uri, size = data.len(), "put object");
        self.buckets
            .write()
            .entry(parsed.bucket)
            .or_default()
            .insert(parsed.key, data);
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .buckets
            .read()
            .get(bucket)
            .map(|objects| {
                objects
                    .range(prefix.to_string()..)
                    .take_while(|(key, _)| key.starts_with(prefix))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn copy(&self, src_uri: &str, dst_uri: &str) -> StorageResult<()> {
        self.copy_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(pattern) = self.fail_copy_matching.read().as_deref() {
            if src_uri.contains(pattern) {
                return Err(StorageError::copy(src_uri, dst_uri, "injected copy failure"));
            }
        }

        let data = self
            .read(src_uri)
            .await
            .map_err(|e| StorageError::copy(src_uri, dst_uri, e.to_string()))?;
        self.put(dst_uri, data).await
    }

    async fn delete(&self, bucket: &str, keys: &[String]) -> StorageResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::delete(format!(
                "injected delete failure for {} keys in '{bucket}'",
                keys.len()
            )));
        }

        if let Some(objects) = self.buckets.write().get_mut(bucket) {
            for key in keys {
                objects.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_read() {
        let store = InMemoryArtifactStore::new();
        store.put("s3://b/a.csv", b"x,y".to_vec()).await.unwrap();

        assert_eq!(store.read("s3://b/a.csv").await.unwrap(), b"x,y");
        assert!(matches!(
            store.read("s3://b/missing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_prefix_scoped_and_ordered() {
        let store = InMemoryArtifactStore::new();
        for key in ["p/job/b", "p/job/a", "p/other/c", "q/job/d"] {
            store.put(&format!("s3://b/{key}"), Vec::new()).await.unwrap();
        }

        let keys = store.list("b", "p/job").await.unwrap();
        assert_eq!(keys, vec!["p/job/a".to_string(), "p/job/b".to_string()]);
        assert!(store.list("missing", "p").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_copy_and_delete() {
        let store = InMemoryArtifactStore::new();
        store.put("s3://b/src", b"1".to_vec()).await.unwrap();
        store.copy("s3://b/src", "s3://other/dst").await.unwrap();
        store.delete("b", &["src".to_string(), "never".to_string()]).await.unwrap();

        assert!(!store.contains("s3://b/src"));
        assert!(store.contains("s3://other/dst"));
        assert_eq!(store.copy_calls(), 1);
        assert_eq!(store.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_injected_copy_failure() {
        let store = InMemoryArtifactStore::new();
        store.put("s3://b/bad/part", b"1".to_vec()).await.unwrap();
        store.fail_copies_matching("bad");

        let result = store.copy("s3://b/bad/part", "s3://b/dst").await;
        assert!(matches!(result, Err(StorageError::Copy { .. })));
        assert!(!store.contains("s3://b/dst"));

        store.clear_failures();
        store.copy("s3://b/bad/part", "s3://b/dst").await.unwrap();
        assert!(store.contains("s3://b/dst"));
    }
}
