//! Error types for path validation.

use thiserror::Error;

/// Errors raised by static inspection of caller-supplied paths.
///
/// These never involve I/O and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path contains a `..` segment.
    #[error("path traversal detected: {path}")]
    Traversal { path: String },

    /// The path begins with a separator.
    #[error("absolute paths are not allowed: {path}")]
    AbsolutePath { path: String },

    /// The configured base prefix cannot act as a namespace root.
    #[error("invalid base prefix {prefix:?}: {reason}")]
    InvalidBasePrefix { prefix: String, reason: String },
}

/// Convenience type alias for path operations.
pub type PathResult<T> = std::result::Result<T, PathError>;
