//! `scheme://bucket/key` URIs.

use super::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A parsed object-storage URI.
///
/// The bucket is everything between `://` and the first `/` that follows it;
/// the key is the remainder and may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageUri {
    /// The URI scheme, e.g. `s3`.
    pub scheme: String,
    /// The bucket name.
    pub bucket: String,
    /// The object key or key prefix, without a leading `/`.
    pub key: String,
}

impl StorageUri {
    /// Creates a URI from its parts.
    #[must_use]
    pub fn new(scheme: impl Into<String>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let key: String = key.into();
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            key: key.trim_start_matches('/').to_string(),
        }
    }

    /// Parses a URI of the form `scheme://bucket/key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidUri` if the scheme separator or the bucket
    /// segment is missing.
    pub fn parse(uri: &str) -> StorageResult<Self> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| StorageError::invalid_uri(uri, "missing '://' separator"))?;

        if scheme.is_empty() {
            return Err(StorageError::invalid_uri(uri, "empty scheme"));
        }

        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(StorageError::invalid_uri(uri, "empty bucket"));
        }

        Ok(Self::new(scheme, bucket, key))
    }

    /// Returns a new URI with `segment` appended to the key.
    #[must_use]
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.trim_matches('/');
        let key = if self.key.is_empty() {
            segment.to_string()
        } else if segment.is_empty() {
            self.key.clone()
        } else {
            format!("{}/{}", self.key.trim_end_matches('/'), segment)
        };
        Self::new(self.scheme.clone(), self.bucket.clone(), key)
    }

    /// Returns a URI in the same bucket pointing at `key`.
    #[must_use]
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self::new(self.scheme.clone(), self.bucket.clone(), key)
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}://{}", self.scheme, self.bucket)
        } else {
            write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
        }
    }
}

impl FromStr for StorageUri {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
