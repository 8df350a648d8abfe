//! Path namespace for bucketfs.
//!
//! Object stores address objects by flat keys inside a bucket. This crate
//! provides the path algebra that lets callers work with relative paths
//! scoped beneath a configured base prefix instead:
//!
//! - [`validate_path`] rejects traversal (`..` segments) and absolute paths
//!   before any request leaves the process
//! - [`Namespace::build_key`] turns a relative path into a bucket key
//! - [`Namespace::strip_key`] turns a bucket key back into a relative path
//!
//! Everything here is pure and free of I/O; a [`Namespace`] can be shared
//! across any number of tasks without synchronization.
//!
//! # Modules
//!
//! - [`error`] -- [`PathError`] and the [`PathResult`] alias
//! - [`namespace`] -- [`Namespace`], validation, and the folder-marker convention

pub mod error;
pub mod namespace;

pub use error::{PathError, PathResult};
pub use namespace::{
    is_folder_marker, normalize, validate_path, Namespace, FOLDER_MARKER, SEPARATOR,
};
