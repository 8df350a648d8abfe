use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::memory::etag_of;
use crate::traits::ObjectClient;
use crate::types::{
    collapse_listing, next_removal, BucketInfo, CopyDestination, CopySource, GetOptions,
    LegalHoldOptions, LegalHoldStatus, ListOptions, ObjectInfo, ObjectInfoReceiver, PresignMethod,
    PutLegalHoldOptions, PutOptions, PutRetentionOptions, RemovalFailure, RemovalReceiver,
    RemoveOptions, Retention, StatOptions, TaggingOptions, Tags, UploadInfo,
    STREAM_CHANNEL_CAPACITY,
};

/// Object store backed by a local directory.
///
/// Layout: `<root>/<bucket>/<key>`, one regular file per object, with key
/// segments mapped to subdirectories. Intended for development and the
/// command-line tool; it keeps no metadata beyond what the filesystem
/// records, so tagging, retention, legal hold, bucket policies, and
/// presigning are unsupported.
#[derive(Clone, Debug)]
pub struct FsObjectClient {
    root: PathBuf,
}

impl FsObjectClient {
    /// Serve buckets from the subdirectories of `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory holding the buckets.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory for `bucket`.
    pub async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        tokio::fs::create_dir_all(self.bucket_dir(bucket)?).await?;
        Ok(())
    }

    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(StoreError::InvalidArgument(format!(
                "invalid bucket name: {bucket:?}"
            )));
        }
        Ok(self.root.join(bucket))
    }

    /// Map a key to its file, refusing keys that would leave the bucket.
    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        let mut path = self.bucket_dir(bucket)?;
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StoreError::InvalidArgument(format!(
                    "key not representable on the filesystem: {key:?}"
                )));
            }
            path.push(segment);
        }
        Ok(path)
    }

    async fn ensure_bucket(&self, bucket: &str) -> StoreResult<PathBuf> {
        let dir = self.bucket_dir(bucket)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StoreError::BucketNotFound(bucket.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::BucketNotFound(bucket.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Map a key for a lookup. A key the filesystem cannot hold was never
    /// stored, so it is reported missing rather than invalid.
    fn lookup_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        match self.object_path(bucket, key) {
            Err(StoreError::InvalidArgument(_)) => Err(StoreError::not_found(bucket, key)),
            other => other,
        }
    }

    async fn read_body(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let dir = self.ensure_bucket(bucket).await?;
        let path = self.lookup_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if is_missing(&e, &dir, &path).await => Err(StoreError::not_found(bucket, key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_body(&self, bucket: &str, key: &str, body: Bytes) -> StoreResult<UploadInfo> {
        self.ensure_bucket(bucket).await?;
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body).await?;
        debug!(path = %path.display(), size = body.len(), "wrote object file");

        let modified = tokio::fs::metadata(&path).await?.modified().ok();
        Ok(UploadInfo {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: etag_of(&body),
            size: body.len() as u64,
            last_modified: modified.map(DateTime::<Utc>::from),
            version_id: None,
        })
    }
}

/// Whether a failed lookup of `path` means the object does not exist.
///
/// Besides `NotFound`, a regular file sitting where a parent directory of
/// `path` should be (the key `a/b` after `a` was stored) also means missing.
async fn is_missing(e: &io::Error, bucket_dir: &Path, path: &Path) -> bool {
    if e.kind() == io::ErrorKind::NotFound {
        return true;
    }
    for ancestor in path.ancestors().skip(1) {
        if ancestor == bucket_dir {
            break;
        }
        if let Ok(meta) = tokio::fs::metadata(ancestor).await {
            if meta.is_file() {
                return true;
            }
        }
    }
    false
}

/// Walk a bucket directory and return its objects in key order.
fn scan_bucket(dir: &Path, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
    let mut objects = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !key.starts_with(prefix) {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        objects.push(ObjectInfo {
            key,
            size: meta.len(),
            last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
            etag: None,
            content_type: None,
            user_metadata: BTreeMap::new(),
        });
    }
    objects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(objects)
}

#[async_trait]
impl ObjectClient for FsObjectClient {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        match self.ensure_bucket(bucket).await {
            Ok(_) => Ok(true),
            Err(StoreError::BucketNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_buckets(&self) -> StoreResult<Vec<BucketInfo>> {
        let mut buckets = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_dir() {
                buckets.push(BucketInfo {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    created: meta.created().ok().map(DateTime::<Utc>::from),
                });
            }
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn bucket_location(&self, bucket: &str) -> StoreResult<String> {
        self.ensure_bucket(bucket).await?;
        Ok("local".to_string())
    }

    async fn bucket_policy(&self, _bucket: &str) -> StoreResult<String> {
        Err(StoreError::Unsupported("bucket policy"))
    }

    async fn set_bucket_policy(&self, _bucket: &str, _policy: &str) -> StoreResult<()> {
        Err(StoreError::Unsupported("bucket policy"))
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        _opts: &StatOptions,
    ) -> StoreResult<ObjectInfo> {
        let dir = self.ensure_bucket(bucket).await?;
        let path = self.lookup_path(bucket, key)?;
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(StoreError::not_found(bucket, key)),
            Err(e) if is_missing(&e, &dir, &path).await => {
                return Err(StoreError::not_found(bucket, key))
            }
            Err(e) => return Err(e.into()),
        };
        // Metadata only; etags are computed when a body is written.
        Ok(ObjectInfo {
            key: key.to_string(),
            size: meta.len(),
            last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
            etag: None,
            content_type: None,
            user_metadata: BTreeMap::new(),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str, opts: &GetOptions) -> StoreResult<Bytes> {
        opts.slice(self.read_body(bucket, key).await?)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        _opts: &PutOptions,
    ) -> StoreResult<UploadInfo> {
        self.write_body(bucket, key, body).await
    }

    async fn remove_object(
        &self,
        bucket: &str,
        key: &str,
        _opts: &RemoveOptions,
    ) -> StoreResult<()> {
        let dir = self.ensure_bucket(bucket).await?;
        let path = match self.lookup_path(bucket, key) {
            Ok(path) => path,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if is_missing(&e, &dir, &path).await => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn copy_object(
        &self,
        dest: &CopyDestination,
        src: &CopySource,
    ) -> StoreResult<UploadInfo> {
        let body = self.read_body(&src.bucket, &src.key).await?;
        self.write_body(&dest.bucket, &dest.key, body).await
    }

    async fn compose_object(
        &self,
        dest: &CopyDestination,
        sources: &[CopySource],
    ) -> StoreResult<UploadInfo> {
        if sources.is_empty() {
            return Err(StoreError::InvalidArgument(
                "compose needs at least one source".into(),
            ));
        }
        let mut body = Vec::new();
        for src in sources {
            body.extend_from_slice(&self.read_body(&src.bucket, &src.key).await?);
        }
        self.write_body(&dest.bucket, &dest.key, Bytes::from(body))
            .await
    }

    fn list_objects(&self, bucket: &str, opts: ListOptions) -> ObjectInfoReceiver {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let client = self.clone();
        let bucket = bucket.to_string();

        tokio::spawn(async move {
            let dir = match client.ensure_bucket(&bucket).await {
                Ok(dir) => dir,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            let prefix = opts.prefix.clone();
            let scanned = tokio::task::spawn_blocking(move || scan_bucket(&dir, &prefix))
                .await
                .unwrap_or_else(|e| Err(StoreError::Backend(e.to_string())));

            match scanned {
                Ok(objects) => {
                    for entry in collapse_listing(objects, &opts.prefix, opts.recursive) {
                        if tx.send(Ok(entry)).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });
        rx
    }

    fn remove_objects(&self, bucket: &str, mut keys: mpsc::Receiver<String>) -> RemovalReceiver {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let client = self.clone();
        let bucket = bucket.to_string();

        tokio::spawn(async move {
            let opts = RemoveOptions::default();
            while let Some(key) = next_removal(&mut keys, &tx).await {
                if let Err(error) = client.remove_object(&bucket, &key, &opts).await {
                    if tx.send(RemovalFailure { key, error }).await.is_err() {
                        break;
                    }
                }
            }
        });
        rx
    }

    async fn get_object_tagging(
        &self,
        _bucket: &str,
        _key: &str,
        _opts: &TaggingOptions,
    ) -> StoreResult<Tags> {
        Err(StoreError::Unsupported("object tagging"))
    }

    async fn put_object_tagging(
        &self,
        _bucket: &str,
        _key: &str,
        _tags: &Tags,
        _opts: &TaggingOptions,
    ) -> StoreResult<()> {
        Err(StoreError::Unsupported("object tagging"))
    }

    async fn remove_object_tagging(
        &self,
        _bucket: &str,
        _key: &str,
        _opts: &TaggingOptions,
    ) -> StoreResult<()> {
        Err(StoreError::Unsupported("object tagging"))
    }

    async fn get_object_retention(
        &self,
        _bucket: &str,
        _key: &str,
        _version_id: Option<&str>,
    ) -> StoreResult<Option<Retention>> {
        Err(StoreError::Unsupported("object retention"))
    }

    async fn put_object_retention(
        &self,
        _bucket: &str,
        _key: &str,
        _opts: &PutRetentionOptions,
    ) -> StoreResult<()> {
        Err(StoreError::Unsupported("object retention"))
    }

    async fn get_object_legal_hold(
        &self,
        _bucket: &str,
        _key: &str,
        _opts: &LegalHoldOptions,
    ) -> StoreResult<LegalHoldStatus> {
        Err(StoreError::Unsupported("legal hold"))
    }

    async fn put_object_legal_hold(
        &self,
        _bucket: &str,
        _key: &str,
        _opts: &PutLegalHoldOptions,
    ) -> StoreResult<()> {
        Err(StoreError::Unsupported("legal hold"))
    }

    async fn presign(
        &self,
        _method: PresignMethod,
        _bucket: &str,
        _key: &str,
        _expiry: Duration,
        _params: &BTreeMap<String, String>,
    ) -> StoreResult<String> {
        Err(StoreError::Unsupported("presigned URLs"))
    }
}
