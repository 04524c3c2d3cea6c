//! The object-storage contract.

use super::StorageResult;
use async_trait::async_trait;
use std::fmt::Debug;

/// Thin contract over an object-storage backend.
///
/// Every object is addressed by a `scheme://bucket/key` URI, except for
/// [`list`](Self::list) and [`delete`](Self::delete) which work on a bucket
/// and raw keys the way object stores batch them.
#[async_trait]
pub trait ArtifactStore: Send + Sync + Debug {
    /// Reads an object.
    async fn read(&self, uri: &str) -> StorageResult<Vec<u8>>;

    /// Writes an object, replacing any existing one.
    async fn put(&self, uri: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Lists keys under `prefix`, in the backend's stable order.
    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>>;

    /// Copies an object.
    async fn copy(&self, src_uri: &str, dst_uri: &str) -> StorageResult<()>;

    /// Deletes a batch of keys. Keys that do not exist are ignored.
    async fn delete(&self, bucket: &str, keys: &[String]) -> StorageResult<()>;
}
