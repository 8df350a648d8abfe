/// Errors reported by an object-storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object exists at this key.
    #[error("no such key: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// The bucket does not exist.
    #[error("no such bucket: {0}")]
    BucketNotFound(String),

    /// The backend refused the operation on this object.
    #[error("access denied on {bucket}/{key}: {reason}")]
    AccessDenied {
        bucket: String,
        key: String,
        reason: String,
    },

    /// The request was malformed (bad key, bad range, empty compose).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend does not implement this operation.
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    /// Any other backend failure (network, internal).
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O error from a filesystem-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` for a missing key.
    ///
    /// A missing bucket is not a missing key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
