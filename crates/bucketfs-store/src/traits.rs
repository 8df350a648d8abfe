use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::StoreResult;
use crate::types::{
    BucketInfo, CopyDestination, CopySource, GetOptions, LegalHoldOptions, LegalHoldStatus,
    ListOptions, ObjectInfo, ObjectInfoReceiver, PresignMethod, PutLegalHoldOptions, PutOptions,
    PutRetentionOptions, RemovalReceiver, RemoveOptions, Retention, StatOptions, TaggingOptions,
    Tags, UploadInfo,
};

/// Client for a flat, key-addressed object store.
///
/// Every object call takes a bucket and a fully-qualified key; the client
/// knows nothing about namespaces or folders. Implementations own their
/// transport, signing, and retry policy.
///
/// Invariants every implementation must satisfy:
/// - A missing key is reported as [`StoreError::NotFound`](crate::StoreError::NotFound),
///   never as a generic backend error.
/// - Listings are delivered in lexicographic key order.
/// - Streaming calls return immediately and produce results from a spawned
///   task; dropping the returned receiver stops that task.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    // ---- Buckets ----

    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool>;
    async fn list_buckets(&self) -> StoreResult<Vec<BucketInfo>>;
    async fn bucket_location(&self, bucket: &str) -> StoreResult<String>;
    async fn bucket_policy(&self, bucket: &str) -> StoreResult<String>;
    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> StoreResult<()>;

    // ---- Single objects ----

    /// Fetch object metadata without the body.
    async fn head_object(&self, bucket: &str, key: &str, opts: &StatOptions)
        -> StoreResult<ObjectInfo>;

    async fn get_object(&self, bucket: &str, key: &str, opts: &GetOptions) -> StoreResult<Bytes>;

    /// Write an object, replacing any previous body at `key`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        opts: &PutOptions,
    ) -> StoreResult<UploadInfo>;

    /// Remove an object. Removing a missing key succeeds.
    async fn remove_object(&self, bucket: &str, key: &str, opts: &RemoveOptions)
        -> StoreResult<()>;

    async fn copy_object(&self, dest: &CopyDestination, src: &CopySource)
        -> StoreResult<UploadInfo>;

    /// Concatenate `sources` in order into `dest`.
    async fn compose_object(
        &self,
        dest: &CopyDestination,
        sources: &[CopySource],
    ) -> StoreResult<UploadInfo>;

    // ---- Streams ----

    /// List objects under `opts.prefix`.
    fn list_objects(&self, bucket: &str, opts: ListOptions) -> ObjectInfoReceiver;

    /// Remove every key received from `keys`, reporting only failures.
    ///
    /// The returned sequence ends once `keys` is closed and drained.
    fn remove_objects(&self, bucket: &str, keys: mpsc::Receiver<String>) -> RemovalReceiver;

    // ---- Tagging, retention, legal hold ----

    async fn get_object_tagging(&self, bucket: &str, key: &str, opts: &TaggingOptions)
        -> StoreResult<Tags>;
    async fn put_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        tags: &Tags,
        opts: &TaggingOptions,
    ) -> StoreResult<()>;
    async fn remove_object_tagging(&self, bucket: &str, key: &str, opts: &TaggingOptions)
        -> StoreResult<()>;

    /// Returns `Ok(None)` if the object carries no retention.
    async fn get_object_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> StoreResult<Option<Retention>>;
    async fn put_object_retention(
        &self,
        bucket: &str,
        key: &str,
        opts: &PutRetentionOptions,
    ) -> StoreResult<()>;

    async fn get_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        opts: &LegalHoldOptions,
    ) -> StoreResult<LegalHoldStatus>;
    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        opts: &PutLegalHoldOptions,
    ) -> StoreResult<()>;

    // ---- URLs ----

    /// Produce a URL granting `method` on `bucket/key` for `expiry`.
    async fn presign(
        &self,
        method: PresignMethod,
        bucket: &str,
        key: &str,
        expiry: Duration,
        params: &BTreeMap<String, String>,
    ) -> StoreResult<String>;
}
