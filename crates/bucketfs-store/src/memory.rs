use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectClient;
use crate::types::{
    collapse_listing, next_removal, BucketInfo, CopyDestination, CopySource, GetOptions,
    LegalHoldOptions, LegalHoldStatus, ListOptions, ObjectInfo, ObjectInfoReceiver, PresignMethod,
    PutLegalHoldOptions, PutOptions, PutRetentionOptions, RemovalFailure, RemovalReceiver,
    RemoveOptions, Retention, RetentionMode, StatOptions, TaggingOptions, Tags, UploadInfo,
    STREAM_CHANNEL_CAPACITY,
};

const DEFAULT_REGION: &str = "us-east-1";

/// Content hash used as the entity tag.
pub(crate) fn etag_of(body: &[u8]) -> String {
    blake3::hash(body).to_hex().to_string()
}

#[derive(Debug, Clone)]
struct StoredEntry {
    body: Bytes,
    info: ObjectInfo,
    tags: Tags,
    retention: Option<Retention>,
    legal_hold: LegalHoldStatus,
}

impl StoredEntry {
    /// Why this entry cannot be removed right now, if it cannot.
    fn removal_block(&self, governance_bypass: bool) -> Option<String> {
        if self.legal_hold == LegalHoldStatus::On {
            return Some("object is under legal hold".into());
        }
        match &self.retention {
            Some(r) if r.retain_until > Utc::now() => match r.mode {
                RetentionMode::Compliance => Some("object is under compliance retention".into()),
                RetentionMode::Governance if !governance_bypass => {
                    Some("object is under governance retention".into())
                }
                RetentionMode::Governance => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug)]
struct MemoryBucket {
    created: DateTime<Utc>,
    policy: String,
    objects: BTreeMap<String, StoredEntry>,
}

impl MemoryBucket {
    fn new() -> Self {
        Self {
            created: Utc::now(),
            policy: String::new(),
            objects: BTreeMap::new(),
        }
    }

    fn entry(&self, bucket: &str, key: &str) -> StoreResult<&StoredEntry> {
        self.objects
            .get(key)
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }

    fn entry_mut(&mut self, bucket: &str, key: &str) -> StoreResult<&mut StoredEntry> {
        self.objects
            .get_mut(key)
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, MemoryBucket>,
    faulty_keys: HashSet<String>,
    /// Listings hang after this many entries until their receiver drops.
    listing_stall: Option<usize>,
}

impl State {
    fn bucket(&self, name: &str) -> StoreResult<&MemoryBucket> {
        self.buckets
            .get(name)
            .ok_or_else(|| StoreError::BucketNotFound(name.to_string()))
    }

    fn bucket_mut(&mut self, name: &str) -> StoreResult<&mut MemoryBucket> {
        self.buckets
            .get_mut(name)
            .ok_or_else(|| StoreError::BucketNotFound(name.to_string()))
    }

    fn check_fault(&self, key: &str) -> StoreResult<()> {
        if self.faulty_keys.contains(key) {
            return Err(StoreError::Backend(format!("injected fault on {key}")));
        }
        Ok(())
    }

    fn remove(&mut self, bucket: &str, key: &str, governance_bypass: bool) -> StoreResult<()> {
        let b = self.bucket_mut(bucket)?;
        if let Some(entry) = b.objects.get(key) {
            if let Some(reason) = entry.removal_block(governance_bypass) {
                return Err(StoreError::AccessDenied {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason,
                });
            }
        }
        b.objects.remove(key);
        Ok(())
    }
}

/// In-memory object store.
///
/// Intended for tests and embedding. Buckets and objects live in
/// `BTreeMap`s behind a shared `RwLock`, so listings come out in key order
/// and spawned stream tasks see the same data as the handle. Supports
/// fault injection for exercising error propagation.
#[derive(Clone)]
pub struct InMemoryObjectClient {
    state: Arc<RwLock<State>>,
    writes: Arc<AtomicU64>,
    open_listings: Arc<AtomicUsize>,
    region: String,
}

impl InMemoryObjectClient {
    /// Create a client with no buckets.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            writes: Arc::new(AtomicU64::new(0)),
            open_listings: Arc::new(AtomicUsize::new(0)),
            region: DEFAULT_REGION.to_string(),
        }
    }

    /// Builder form of [`InMemoryObjectClient::create_bucket`].
    pub fn with_bucket(self, name: &str) -> Self {
        self.create_bucket(name);
        self
    }

    /// Create a bucket if it does not already exist.
    pub fn create_bucket(&self, name: &str) {
        self.state
            .write()
            .expect("lock poisoned")
            .buckets
            .entry(name.to_string())
            .or_insert_with(MemoryBucket::new);
    }

    /// Sorted keys currently stored in `bucket` (empty if it is missing).
    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        let state = self.state.read().expect("lock poisoned");
        state
            .buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Stored body of `bucket/key`, bypassing fault injection.
    pub fn object_body(&self, bucket: &str, key: &str) -> Option<Bytes> {
        let state = self.state.read().expect("lock poisoned");
        state
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|e| e.body.clone())
    }

    /// Number of object writes performed so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every metadata or body read of `key` fail with a backend error.
    pub fn inject_fault(&self, key: &str) {
        self.state
            .write()
            .expect("lock poisoned")
            .faulty_keys
            .insert(key.to_string());
    }

    /// Make every later listing deliver `entries` entries and then hang
    /// until its receiver is dropped, like a slow backend mid-listing.
    pub fn stall_listings_after(&self, entries: usize) {
        self.state.write().expect("lock poisoned").listing_stall = Some(entries);
    }

    /// Listing tasks that are still producing.
    pub fn open_listings(&self) -> usize {
        self.open_listings.load(Ordering::SeqCst)
    }

    fn store(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
        user_metadata: BTreeMap<String, String>,
        tags: Tags,
    ) -> StoreResult<UploadInfo> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("object key must not be empty".into()));
        }
        let now = Utc::now();
        let etag = etag_of(&body);
        let size = body.len() as u64;
        let entry = StoredEntry {
            info: ObjectInfo {
                key: key.to_string(),
                size,
                last_modified: Some(now),
                etag: Some(etag.clone()),
                content_type,
                user_metadata,
            },
            body,
            tags,
            retention: None,
            legal_hold: LegalHoldStatus::Off,
        };

        let mut state = self.state.write().expect("lock poisoned");
        state
            .bucket_mut(bucket)?
            .objects
            .insert(key.to_string(), entry);
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(UploadInfo {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag,
            size,
            last_modified: Some(now),
            version_id: None,
        })
    }

    fn read_entry(&self, bucket: &str, key: &str) -> StoreResult<StoredEntry> {
        let state = self.state.read().expect("lock poisoned");
        state.check_fault(key)?;
        state.bucket(bucket)?.entry(bucket, key).cloned()
    }

    fn update_entry(
        &self,
        bucket: &str,
        key: &str,
        f: impl FnOnce(&mut StoredEntry) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        f(state.bucket_mut(bucket)?.entry_mut(bucket, key)?)
    }
}

impl Default for InMemoryObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryObjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bucket_count = self.state.read().expect("lock poisoned").buckets.len();
        f.debug_struct("InMemoryObjectClient")
            .field("bucket_count", &bucket_count)
            .field("region", &self.region)
            .finish()
    }
}

#[async_trait]
impl ObjectClient for InMemoryObjectClient {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.buckets.contains_key(bucket))
    }

    async fn list_buckets(&self) -> StoreResult<Vec<BucketInfo>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .buckets
            .iter()
            .map(|(name, b)| BucketInfo {
                name: name.clone(),
                created: Some(b.created),
            })
            .collect())
    }

    async fn bucket_location(&self, bucket: &str) -> StoreResult<String> {
        let state = self.state.read().expect("lock poisoned");
        state.bucket(bucket)?;
        Ok(self.region.clone())
    }

    async fn bucket_policy(&self, bucket: &str) -> StoreResult<String> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.bucket(bucket)?.policy.clone())
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.bucket_mut(bucket)?.policy = policy.to_string();
        Ok(())
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        _opts: &StatOptions,
    ) -> StoreResult<ObjectInfo> {
        Ok(self.read_entry(bucket, key)?.info)
    }

    async fn get_object(&self, bucket: &str, key: &str, opts: &GetOptions) -> StoreResult<Bytes> {
        opts.slice(self.read_entry(bucket, key)?.body)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        opts: &PutOptions,
    ) -> StoreResult<UploadInfo> {
        self.store(
            bucket,
            key,
            body,
            opts.content_type.clone(),
            opts.user_metadata.clone(),
            opts.user_tags.clone(),
        )
    }

    async fn remove_object(
        &self,
        bucket: &str,
        key: &str,
        opts: &RemoveOptions,
    ) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.remove(bucket, key, opts.governance_bypass)
    }

    async fn copy_object(
        &self,
        dest: &CopyDestination,
        src: &CopySource,
    ) -> StoreResult<UploadInfo> {
        let source = self.read_entry(&src.bucket, &src.key)?;
        let metadata = dest
            .user_metadata
            .clone()
            .unwrap_or(source.info.user_metadata);
        self.store(
            &dest.bucket,
            &dest.key,
            source.body,
            source.info.content_type,
            metadata,
            source.tags,
        )
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
            body.extend_from_slice(&self.read_entry(&src.bucket, &src.key)?.body);
        }
        self.store(
            &dest.bucket,
            &dest.key,
            Bytes::from(body),
            None,
            dest.user_metadata.clone().unwrap_or_default(),
            Tags::new(),
        )
    }

    fn list_objects(&self, bucket: &str, opts: ListOptions) -> ObjectInfoReceiver {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let (snapshot, stall): (StoreResult<Vec<ObjectInfo>>, _) = {
            let state = self.state.read().expect("lock poisoned");
            let snapshot = state.bucket(bucket).map(|b| {
                let matching = b
                    .objects
                    .range(opts.prefix.clone()..)
                    .take_while(|(key, _)| key.starts_with(&opts.prefix))
                    .map(|(_, entry)| entry.info.clone());
                collapse_listing(matching, &opts.prefix, opts.recursive)
            });
            (snapshot, state.listing_stall)
        };

        let open = Arc::clone(&self.open_listings);
        open.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            match snapshot {
                Ok(entries) => {
                    for (sent, entry) in entries.into_iter().enumerate() {
                        if stall == Some(sent) {
                            tx.closed().await;
                            break;
                        }
                        if tx.send(Ok(entry)).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
            open.fetch_sub(1, Ordering::SeqCst);
        });
        rx
    }

    fn remove_objects(&self, bucket: &str, mut keys: mpsc::Receiver<String>) -> RemovalReceiver {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let state = Arc::clone(&self.state);
        let bucket = bucket.to_string();

        tokio::spawn(async move {
            while let Some(key) = next_removal(&mut keys, &tx).await {
                let result = state
                    .write()
                    .expect("lock poisoned")
                    .remove(&bucket, &key, false);
                if let Err(error) = result {
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
        bucket: &str,
        key: &str,
        _opts: &TaggingOptions,
    ) -> StoreResult<Tags> {
        Ok(self.read_entry(bucket, key)?.tags)
    }

    async fn put_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        tags: &Tags,
        _opts: &TaggingOptions,
    ) -> StoreResult<()> {
        self.update_entry(bucket, key, |e| {
            e.tags = tags.clone();
            Ok(())
        })
    }

    async fn remove_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        _opts: &TaggingOptions,
    ) -> StoreResult<()> {
        self.update_entry(bucket, key, |e| {
            e.tags.clear();
            Ok(())
        })
    }

    async fn get_object_retention(
        &self,
        bucket: &str,
        key: &str,
        _version_id: Option<&str>,
    ) -> StoreResult<Option<Retention>> {
        Ok(self.read_entry(bucket, key)?.retention)
    }

    async fn put_object_retention(
        &self,
        bucket: &str,
        key: &str,
        opts: &PutRetentionOptions,
    ) -> StoreResult<()> {
        self.update_entry(bucket, key, |e| {
            if let Some(current) = &e.retention {
                let active = current.retain_until > Utc::now();
                let locked = match current.mode {
                    RetentionMode::Compliance => true,
                    RetentionMode::Governance => !opts.governance_bypass,
                };
                if active && locked {
                    return Err(StoreError::AccessDenied {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        reason: format!("active {} retention", current.mode),
                    });
                }
            }
            e.retention = opts.retention.clone();
            Ok(())
        })
    }

    async fn get_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        _opts: &LegalHoldOptions,
    ) -> StoreResult<LegalHoldStatus> {
        Ok(self.read_entry(bucket, key)?.legal_hold)
    }

    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        opts: &PutLegalHoldOptions,
    ) -> StoreResult<()> {
        self.update_entry(bucket, key, |e| {
            e.legal_hold = opts.status;
            Ok(())
        })
    }

    async fn presign(
        &self,
        method: PresignMethod,
        bucket: &str,
        key: &str,
        expiry: Duration,
        params: &BTreeMap<String, String>,
    ) -> StoreResult<String> {
        {
            let state = self.state.read().expect("lock poisoned");
            state.bucket(bucket)?;
        }
        let mut url = format!(
            "memory://{bucket}/{key}?method={method}&expires={}",
            expiry.as_secs()
        );
        for (name, value) in params {
            url.push_str(&format!("&{name}={value}"));
        }
        Ok(url)
    }
}
