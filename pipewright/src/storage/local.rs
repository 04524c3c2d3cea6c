//! Filesystem-backed object store.

use super::{ArtifactStore, StorageError, StorageResult, StorageUri, TRACING_TARGET};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Maps `scheme://bucket/key` onto `{root}/{bucket}/{key}`.
///
/// The scheme is ignored, so `s3://` URIs produced by the pipeline can be
/// served from a local directory during development runs.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every object lives in a direct child directory of `root`.
    fn bucket_path(&self, bucket: &str) -> StorageResult<PathBuf> {
        if bucket.is_empty() || bucket == "." || bucket == ".." || bucket.contains(['/', '\\']) {
            return Err(StorageError::invalid_uri(bucket, "bucket must be a single path segment"));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        if key.starts_with(['/', '\\']) || key.split(['/', '\\']).any(|segment| segment == "..") {
            return Err(StorageError::invalid_uri(key, "parent segments are not allowed"));
        }
        Ok(self.bucket_path(bucket)?.join(key))
    }

    fn uri_path(&self, uri: &str) -> StorageResult<PathBuf> {
        let parsed = StorageUri::parse(uri)?;
        if parsed.key.is_empty() {
            return Err(StorageError::invalid_uri(uri, "empty key"));
        }
        self.object_path(&parsed.bucket, &parsed.key)
    }

    async fn walk(bucket_root: &Path) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![bucket_root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::list(format!("{}: {e}", dir.display()))),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(bucket_root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn read(&self, uri: &str) -> StorageResult<Vec<u8>> {
        let path = self.uri_path(uri)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::not_found(uri),
            _ => StorageError::read(format!("{uri}: {e}")),
        })
    }

    async fn put(&self, uri: &str, data: Vec<u8>) -> StorageResult<()> {
        let path = self.uri_path(uri)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::trace!(target: TRACING_TARGET, path = %path.display(), size = data.len(), "write file");
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StorageError::write(format!("{uri}: {e}")))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        let keys = Self::walk(&self.bucket_path(bucket)?).await?;
        Ok(keys.into_iter().filter(|key| key.starts_with(prefix)).collect())
    }

    async fn copy(&self, src_uri: &str, dst_uri: &str) -> StorageResult<()> {
        let src = self.uri_path(src_uri)?;
        let dst = self.uri_path(dst_uri)?;
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::copy(&src, &dst)
            .await
            .map(|_| ())
            .map_err(|e| StorageError::copy(src_uri, dst_uri, e.to_string()))
    }

    async fn delete(&self, bucket: &str, keys: &[String]) -> StorageResult<()> {
        for key in keys {
            let path = self.object_path(bucket, key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::delete(format!("{}: {e}", path.display()))),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_list_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        store.put("s3://bucket/p/job/b.csv", b"b".to_vec()).await.unwrap();
        store.put("s3://bucket/p/job/a.csv", b"a".to_vec()).await.unwrap();
        store.put("s3://bucket/other.csv", b"o".to_vec()).await.unwrap();

        let keys = store.list("bucket", "p/job").await.unwrap();
        assert_eq!(keys, vec!["p/job/a.csv".to_string(), "p/job/b.csv".to_string()]);
        assert_eq!(store.read("s3://bucket/p/job/a.csv").await.unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_missing_bucket_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        assert!(store.list("nothing", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_copy_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        store.put("s3://b/src/x", b"x".to_vec()).await.unwrap();

        store.copy("s3://b/src/x", "s3://b/dst/y").await.unwrap();
        store.delete("b", &["src/x".to_string()]).await.unwrap();

        assert!(matches!(store.read("s3://b/src/x").await, Err(StorageError::NotFound(_))));
        assert_eq!(store.read("s3://b/dst/y").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_rejects_parent_segments() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        assert!(store.put("s3://b/../escape", Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_buckets_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let store = LocalArtifactStore::new(&root);

        assert!(store.put("s3://../escaped.txt", b"x".to_vec()).await.is_err());
        assert!(store.put("s3://./inside-root.txt", b"x".to_vec()).await.is_err());
        assert!(!dir.path().join("escaped.txt").exists());

        assert!(store.list("..", "").await.is_err());
        assert!(store.delete("..", &["escaped.txt".to_string()]).await.is_err());
    }
}
