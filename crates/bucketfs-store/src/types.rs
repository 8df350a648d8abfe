use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{StoreError, StoreResult};

/// Object tags: key/value pairs attached to an object.
pub type Tags = BTreeMap<String, String>;

/// Capacity of the channels that carry listing and removal results.
pub const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Live sequence of listing entries.
///
/// Entries are delivered in key order. The sequence ends when the
/// backend listing is exhausted; dropping the receiver stops the producer.
pub type ObjectInfoReceiver = mpsc::Receiver<StoreResult<ObjectInfo>>;

/// Live sequence of per-object failures from a bulk removal.
///
/// Keys that were removed successfully produce no item.
pub type RemovalReceiver = mpsc::Receiver<RemovalFailure>;

/// Metadata for one object, or for a common prefix in a non-recursive
/// listing (a key ending in `/` with zero size).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key.
    pub key: String,
    /// Size of the object body in bytes.
    pub size: u64,
    /// Last modification time, if the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
    /// Entity tag of the current body.
    pub etag: Option<String>,
    /// MIME type recorded at upload.
    pub content_type: Option<String>,
    /// User-defined metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_metadata: BTreeMap<String, String>,
}

impl ObjectInfo {
    /// Entry standing for a common prefix.
    pub fn prefix(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: 0,
            last_modified: None,
            etag: None,
            content_type: None,
            user_metadata: BTreeMap::new(),
        }
    }

    /// Returns `true` if this entry is a common prefix rather than an object.
    pub fn is_prefix(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// Result of a write (put, copy, compose).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInfo {
    pub bucket: String,
    pub key: String,
    pub etag: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub version_id: Option<String>,
}

/// A bucket visible to the credentials in use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
}

/// Options for a metadata lookup.
#[derive(Clone, Debug, Default)]
pub struct StatOptions {
    pub version_id: Option<String>,
}

/// Options for reading an object body.
#[derive(Clone, Debug, Default)]
pub struct GetOptions {
    pub version_id: Option<String>,
    /// Inclusive byte range `(first, last)`.
    pub range: Option<(u64, u64)>,
}

impl GetOptions {
    /// Apply [`GetOptions::range`] to a full body.
    pub fn slice(&self, body: bytes::Bytes) -> StoreResult<bytes::Bytes> {
        match self.range {
            None => Ok(body),
            Some((first, last)) => {
                let len = body.len() as u64;
                if first > last || first >= len {
                    return Err(StoreError::InvalidArgument(format!(
                        "range {first}-{last} not satisfiable for {len} bytes"
                    )));
                }
                let end = last.min(len - 1) + 1;
                Ok(body.slice(first as usize..end as usize))
            }
        }
    }
}

/// Options for writing an object.
#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub user_metadata: BTreeMap<String, String>,
    pub user_tags: Tags,
}

/// Options for removing a single object.
#[derive(Clone, Debug, Default)]
pub struct RemoveOptions {
    pub version_id: Option<String>,
    /// Remove even if a governance-mode retention is active.
    pub governance_bypass: bool,
}

/// Options for a prefix listing.
#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    pub prefix: String,
    /// When `false`, keys below the next `/` after the prefix are rolled up
    /// into one common-prefix entry.
    pub recursive: bool,
}

/// Source object for copy and compose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopySource {
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
}

impl CopySource {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            version_id: None,
        }
    }
}

/// Destination object for copy and compose.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyDestination {
    pub bucket: String,
    pub key: String,
    /// Replaces the source metadata when set.
    pub user_metadata: Option<BTreeMap<String, String>>,
}

impl CopyDestination {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            user_metadata: None,
        }
    }
}

/// Options for tagging calls.
#[derive(Clone, Debug, Default)]
pub struct TaggingOptions {
    pub version_id: Option<String>,
}

/// Object-lock retention mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionMode {
    /// Removable by callers that request a governance bypass.
    Governance,
    /// Not removable by anyone until the retention date passes.
    Compliance,
}

impl std::fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Governance => write!(f, "GOVERNANCE"),
            Self::Compliance => write!(f, "COMPLIANCE"),
        }
    }
}

/// Retention currently applied to an object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    pub mode: RetentionMode,
    pub retain_until: DateTime<Utc>,
}

/// Options for setting retention.
#[derive(Clone, Debug, Default)]
pub struct PutRetentionOptions {
    /// `None` clears the retention.
    pub retention: Option<Retention>,
    pub governance_bypass: bool,
    pub version_id: Option<String>,
}

/// Legal-hold flag of an object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegalHoldStatus {
    On,
    #[default]
    Off,
}

/// Options for reading the legal hold.
#[derive(Clone, Debug, Default)]
pub struct LegalHoldOptions {
    pub version_id: Option<String>,
}

/// Options for setting the legal hold.
#[derive(Clone, Debug, Default)]
pub struct PutLegalHoldOptions {
    pub status: LegalHoldStatus,
    pub version_id: Option<String>,
}

/// HTTP method a presigned URL authorizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresignMethod {
    Get,
    Put,
    Head,
}

impl std::fmt::Display for PresignMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Put => write!(f, "PUT"),
            Self::Head => write!(f, "HEAD"),
        }
    }
}

/// One failed key from a bulk removal.
#[derive(Debug)]
pub struct RemovalFailure {
    pub key: String,
    pub error: StoreError,
}

/// Next key a bulk removal should delete, or `None` once the key stream
/// ends or the caller has dropped the failure receiver.
///
/// Checked before every removal so a cancelled caller stops the deletes
/// still queued in the key channel.
pub(crate) async fn next_removal(
    keys: &mut mpsc::Receiver<String>,
    failures: &mpsc::Sender<RemovalFailure>,
) -> Option<String> {
    if failures.is_closed() {
        return None;
    }
    tokio::select! {
        biased;
        _ = failures.closed() => None,
        key = keys.recv() => key.filter(|_| !failures.is_closed()),
    }
}

/// Roll a key-ordered run of objects under `prefix` into listing entries.
///
/// Recursive listings pass through unchanged. Non-recursive listings
/// replace every key that continues past the next `/` with one
/// common-prefix entry, reported once at its first position.
pub(crate) fn collapse_listing(
    objects: impl IntoIterator<Item = ObjectInfo>,
    prefix: &str,
    recursive: bool,
) -> Vec<ObjectInfo> {
    let mut entries: Vec<ObjectInfo> = Vec::new();
    for info in objects {
        let Some(rest) = info.key.strip_prefix(prefix) else {
            continue;
        };
        if recursive {
            entries.push(info);
            continue;
        }
        match rest.find('/') {
            Some(idx) => {
                let common = format!("{prefix}{}", &rest[..=idx]);
                if entries.last().map(|e| e.key.as_str()) != Some(common.as_str()) {
                    entries.push(ObjectInfo::prefix(common));
                }
            }
            None => entries.push(info),
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objects(keys: &[&str]) -> Vec<ObjectInfo> {
        keys.iter().map(|k| ObjectInfo::prefix(*k)).collect()
    }

    fn keys(entries: &[ObjectInfo]) -> Vec<&str> {
        entries.iter().map(|e| e.key.as_str()).collect()
    }

    #[test]
    fn recursive_listing_keeps_every_key() {
        let input = objects(&["a/1", "a/b/2", "c"]);
        let out = collapse_listing(input, "", true);
        assert_eq!(keys(&out), vec!["a/1", "a/b/2", "c"]);
    }

    #[test]
    fn flat_listing_rolls_up_common_prefixes() {
        let input = objects(&["docs/a.txt", "docs/b/c.txt", "img/x.png", "readme"]);
        let out = collapse_listing(input, "", false);
        assert_eq!(keys(&out), vec!["docs/", "img/", "readme"]);
        assert!(out[0].is_prefix());
        assert!(!out[2].is_prefix());
    }

    #[test]
    fn flat_listing_under_prefix() {
        let input = objects(&["app/docs/a", "app/docs/b/c", "app/docs/b/d", "app/x"]);
        let out = collapse_listing(input, "app/docs/", false);
        assert_eq!(keys(&out), vec!["app/docs/a", "app/docs/b/"]);
    }

    #[test]
    fn range_slicing() {
        let body = bytes::Bytes::from_static(b"0123456789");
        let opts = GetOptions {
            range: Some((2, 4)),
            ..Default::default()
        };
        assert_eq!(&opts.slice(body.clone()).unwrap()[..], b"234");

        let tail = GetOptions {
            range: Some((8, 100)),
            ..Default::default()
        };
        assert_eq!(&tail.slice(body.clone()).unwrap()[..], b"89");

        let bad = GetOptions {
            range: Some((20, 30)),
            ..Default::default()
        };
        assert!(bad.slice(body).is_err());
    }
}
