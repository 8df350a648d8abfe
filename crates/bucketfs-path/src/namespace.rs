//! Translation between caller-relative paths and bucket object keys.
//!
//! A [`Namespace`] confines every caller-visible path beneath a base prefix.
//! Requests going out are built with [`Namespace::build_key`]; keys coming
//! back from storage are stripped with [`Namespace::strip_key`]. The two are
//! inverses for any path that passes [`validate_path`].
//!
//! Rules applied to relative paths:
//! - Backslashes are canonicalized to `/`
//! - A `..` segment anywhere is rejected, not only as a prefix
//! - A leading `/` is rejected (paths are relative to the namespace root)
//! - Leading and trailing slashes are trimmed before keys are combined

use tracing::warn;

use crate::error::{PathError, PathResult};

/// Separator between key segments.
pub const SEPARATOR: char = '/';

/// Name of the zero-length object that witnesses a folder's existence.
///
/// Any key whose last segment equals this name is a folder marker, not
/// user content.
pub const FOLDER_MARKER: &str = ".empty";

const PARENT_SEGMENT: &str = "..";

/// Canonicalize separators to `/` without trimming anything.
fn to_slash(path: &str) -> String {
    path.replace('\\', "/")
}

/// Canonicalize separators and trim leading/trailing slashes.
///
/// # Examples
///
/// ```
/// use bucketfs_path::normalize;
///
/// assert_eq!(normalize("/a/b/"), "a/b");
/// assert_eq!(normalize("a\\b"), "a/b");
/// assert_eq!(normalize(""), "");
/// ```
pub fn normalize(path: &str) -> String {
    to_slash(path).trim_matches(SEPARATOR).to_string()
}

/// Validate a caller-supplied relative path, returning `Ok(())` if safe.
///
/// Must run before any operation that turns `path` into a key.
///
/// # Examples
///
/// ```
/// use bucketfs_path::validate_path;
///
/// assert!(validate_path("documents/hello.txt").is_ok());
/// assert!(validate_path("a/../b").is_err());
/// assert!(validate_path("/etc/passwd").is_err());
/// ```
pub fn validate_path(path: &str) -> PathResult<()> {
    let canonical = to_slash(path);

    if canonical.split(SEPARATOR).any(|segment| segment == PARENT_SEGMENT) {
        return Err(PathError::Traversal {
            path: path.to_string(),
        });
    }

    if canonical.starts_with(SEPARATOR) {
        return Err(PathError::AbsolutePath {
            path: path.to_string(),
        });
    }

    Ok(())
}

/// Returns `true` if the last segment of `key` is the folder marker.
pub fn is_folder_marker(key: &str) -> bool {
    key.rsplit(SEPARATOR).next() == Some(FOLDER_MARKER)
}

/// A base prefix under which all relative paths live.
///
/// Immutable once constructed. An empty base prefix means no confinement:
/// relative paths and keys coincide.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Namespace {
    base: String,
}

impl Namespace {
    /// Create a namespace rooted at `base_prefix`.
    ///
    /// The prefix is normalized (separators canonicalized, outer slashes
    /// trimmed). A prefix containing a `..` segment is rejected.
    pub fn new(base_prefix: &str) -> PathResult<Self> {
        let base = normalize(base_prefix);
        if base.split(SEPARATOR).any(|segment| segment == PARENT_SEGMENT) {
            return Err(PathError::InvalidBasePrefix {
                prefix: base_prefix.to_string(),
                reason: "must not contain a '..' segment".into(),
            });
        }
        Ok(Self { base })
    }

    /// A namespace with no base prefix.
    pub fn unconfined() -> Self {
        Self::default()
    }

    /// The normalized base prefix (empty when unconfined).
    pub fn base_prefix(&self) -> &str {
        &self.base
    }

    /// Returns `true` if a base prefix is configured.
    pub fn is_confined(&self) -> bool {
        !self.base.is_empty()
    }

    /// Build the fully-qualified key for a relative path.
    ///
    /// Total and deterministic; callers validate first.
    ///
    /// | base   | path  | key        |
    /// |--------|-------|------------|
    /// | ""     | ""    | ""         |
    /// | ""     | "a/b" | "a/b"      |
    /// | "base" | ""    | "base"     |
    /// | "base" | "a/b" | "base/a/b" |
    pub fn build_key(&self, path: &str) -> String {
        let clean = normalize(path);
        match (self.base.is_empty(), clean.is_empty()) {
            (true, _) => clean,
            (false, true) => self.base.clone(),
            (false, false) => format!("{}{SEPARATOR}{clean}", self.base),
        }
    }

    /// Strip the base prefix from a key returned by storage.
    ///
    /// A key equal to the base prefix maps to the empty string. A key
    /// outside the namespace is returned unchanged so callers always get a
    /// printable key back.
    pub fn strip_key(&self, key: &str) -> String {
        if self.base.is_empty() {
            return key.to_string();
        }

        let key = to_slash(key);
        if let Some(rest) = key
            .strip_prefix(self.base.as_str())
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
        {
            return rest.to_string();
        }
        if key == self.base {
            return String::new();
        }

        warn!(key = %key, base = %self.base, "key outside namespace returned unchanged");
        key
    }

    /// Key of the marker object for `folder`.
    pub fn folder_marker_key(&self, folder: &str) -> String {
        format!("{}{SEPARATOR}{FOLDER_MARKER}", self.build_key(folder))
    }

    /// Key prefix that scopes strictly to the children of `folder`.
    ///
    /// Always ends with exactly one separator, so `docs` never matches the
    /// sibling `docs-old`.
    pub fn folder_prefix(&self, folder: &str) -> String {
        let mut prefix = self.build_key(folder);
        if !prefix.ends_with(SEPARATOR) {
            prefix.push(SEPARATOR);
        }
        prefix
    }

    /// Key prefix for a listing rooted at `prefix`.
    ///
    /// Like [`Namespace::folder_prefix`], except that the whole-bucket
    /// listing (empty key) stays empty.
    pub fn listing_prefix(&self, prefix: &str) -> String {
        let key = self.build_key(prefix);
        if key.is_empty() {
            key
        } else {
            let mut key = key;
            if !key.ends_with(SEPARATOR) {
                key.push(SEPARATOR);
            }
            key
        }
    }
}
