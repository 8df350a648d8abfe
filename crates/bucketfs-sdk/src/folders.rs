//! Folder emulation over a flat bucket.
//!
//! Object stores have no directories. [`MarkerFolders`] emulates them with
//! two conventions:
//!
//! - A folder *exists* when its marker object `<folder-key>/.empty` exists.
//!   Content under the folder's prefix does not count.
//! - A folder is *listed* as a child of a prefix when some key continues
//!   past it. Markers are not consulted.
//!
//! So a folder holding objects but no marker is listed by
//! [`FolderOps::list_folders`] yet reported absent by
//! [`FolderOps::folder_exists`]. Both rules are kept as they are; the tests
//! below pin each one down.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, error};

use bucketfs_path::{normalize, validate_path, Namespace, SEPARATOR};
use bucketfs_store::{
    ListOptions, ObjectClient, PutOptions, StatOptions, StoreError, STREAM_CHANNEL_CAPACITY,
};

use crate::error::{ClientError, ClientResult};
use crate::task::TaskGuard;

/// Folder operations over relative paths.
///
/// Implementations decide how a folder is represented in storage; callers
/// only see relative paths and folder names.
#[async_trait]
pub trait FolderOps: Send + Sync {
    /// Whether `path` exists as a folder.
    async fn folder_exists(&self, path: &str) -> ClientResult<bool>;

    /// Create `path` as a folder. Succeeds without writing if it exists.
    async fn create_folder(&self, path: &str) -> ClientResult<()>;

    /// Remove `path` and everything beneath it.
    ///
    /// Fails on the first object the backend refuses to remove. Which other
    /// objects were removed by then is unspecified.
    async fn remove_folder(&self, path: &str) -> ClientResult<()>;

    /// Names of the immediate child folders of `prefix`, in first-seen
    /// order, each once. An empty prefix means the namespace root.
    async fn list_folders(&self, prefix: &str) -> ClientResult<Vec<String>>;
}

/// Marker-object folder emulation for one bucket and namespace.
#[derive(Clone)]
pub struct MarkerFolders {
    backend: Arc<dyn ObjectClient>,
    bucket: String,
    namespace: Namespace,
}

impl MarkerFolders {
    pub fn new(
        backend: Arc<dyn ObjectClient>,
        bucket: impl Into<String>,
        namespace: Namespace,
    ) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
            namespace,
        }
    }
}

impl std::fmt::Debug for MarkerFolders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerFolders")
            .field("bucket", &self.bucket)
            .field("namespace", &self.namespace)
            .finish()
    }
}

#[async_trait]
impl FolderOps for MarkerFolders {
    async fn folder_exists(&self, path: &str) -> ClientResult<bool> {
        validate_path(path)?;
        let marker = self.namespace.folder_marker_key(path);
        debug!(bucket = %self.bucket, marker = %marker, "checking folder existence");

        match self
            .backend
            .head_object(&self.bucket, &marker, &StatOptions::default())
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_folder(&self, path: &str) -> ClientResult<()> {
        validate_path(path)?;
        if self.folder_exists(path).await? {
            return Ok(());
        }

        let marker = self.namespace.folder_marker_key(path);
        debug!(bucket = %self.bucket, marker = %marker, "creating folder");
        self.backend
            .put_object(&self.bucket, &marker, Bytes::new(), &PutOptions::default())
            .await?;
        Ok(())
    }

    async fn remove_folder(&self, path: &str) -> ClientResult<()> {
        validate_path(path)?;
        let prefix = self.namespace.folder_prefix(path);
        debug!(bucket = %self.bucket, folder = %prefix, "removing folder");

        let mut listing = self.backend.list_objects(
            &self.bucket,
            ListOptions {
                prefix,
                recursive: true,
            },
        );
        let (key_tx, key_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        // Listing feeds removal incrementally; dropping the feeder (early
        // return, or the caller dropping this future) stops the listing.
        let feeder = TaskGuard::spawn(async move {
            while let Some(item) = listing.recv().await {
                let info = item?;
                if key_tx.send(info.key).await.is_err() {
                    break;
                }
            }
            Ok::<(), StoreError>(())
        });

        let mut failures = self.backend.remove_objects(&self.bucket, key_rx);
        if let Some(failure) = failures.recv().await {
            error!(
                bucket = %self.bucket,
                object = %failure.key,
                error = %failure.error,
                "error removing object during folder deletion"
            );
            return Err(failure.error.into());
        }

        feeder.await.map_err(|e| {
            ClientError::Store(StoreError::Backend(format!("listing task failed: {e}")))
        })??;
        Ok(())
    }

    async fn list_folders(&self, prefix: &str) -> ClientResult<Vec<String>> {
        if !prefix.is_empty() {
            validate_path(prefix)?;
        }
        let full_prefix = self.namespace.listing_prefix(prefix);
        debug!(bucket = %self.bucket, prefix = %full_prefix, "listing folders");

        let mut listing = self.backend.list_objects(
            &self.bucket,
            ListOptions {
                prefix: full_prefix,
                recursive: false,
            },
        );

        let mut relative_root = normalize(prefix);
        if !relative_root.is_empty() {
            relative_root.push(SEPARATOR);
        }

        let mut folders = Vec::new();
        let mut seen = HashSet::new();
        while let Some(item) = listing.recv().await {
            let info = item?;
            let stripped = self.namespace.strip_key(&info.key);
            let relative = stripped
                .strip_prefix(relative_root.as_str())
                .unwrap_or(&stripped);

            let mut parts = relative.split(SEPARATOR);
            if let (Some(first), Some(_)) = (parts.next(), parts.next()) {
                if !first.is_empty() && seen.insert(first.to_string()) {
                    folders.push(first.to_string());
                }
            }
        }
        Ok(folders)
    }
}
