//! Storage error types.

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during object-storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Object not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The URI is not of the form `scheme://bucket/key`.
    #[error("invalid uri '{uri}': {reason}")]
    InvalidUri {
        /// The offending URI.
        uri: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Read operation failed.
    #[error("read failed: {0}")]
    Read(String),

    /// Write operation failed.
    #[error("write failed: {0}")]
    Write(String),

    /// Copy operation failed.
    #[error("copy {from} -> {to} failed: {reason}")]
    Copy {
        /// Source URI.
        from: String,
        /// Destination URI.
        to: String,
        /// The underlying failure.
        reason: String,
    },

    /// Delete operation failed.
    #[error("delete failed: {0}")]
    Delete(String),

    /// List operation failed.
    #[error("list failed: {0}")]
    List(String),

    /// Filesystem error from a local backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Creates a new not found error.
    pub fn not_found(uri: impl Into<String>) -> Self {
        Self::NotFound(uri.into())
    }

    /// Creates a new invalid uri error.
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new read error.
    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }

    /// Creates a new write error.
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Creates a new copy error.
    pub fn copy(from: impl Into<String>, to: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Copy {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::Delete(msg.into())
    }

    /// Creates a new list error.
    pub fn list(msg: impl Into<String>) -> Self {
        Self::List(msg.into())
    }
}
