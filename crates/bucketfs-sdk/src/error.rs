use thiserror::Error;

use bucketfs_path::PathError;
use bucketfs_store::StoreError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// A caller-supplied path failed validation; nothing was sent.
    #[error("invalid path: {0}")]
    Path(#[from] PathError),

    /// A compose source in the configured bucket failed validation.
    #[error("invalid source object path {path}: {source}")]
    InvalidSource { path: String, source: PathError },

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Missing required field or unreachable bucket at construction.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("public base URL not configured")]
    PublicUrlNotConfigured,
}

impl ClientError {
    /// Returns `true` if storage reported a missing key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
