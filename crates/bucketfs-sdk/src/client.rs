use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use bucketfs_path::{validate_path, Namespace};
use bucketfs_store::{
    CopyDestination, CopySource, GetOptions, ListOptions, ObjectClient, ObjectInfo, PutOptions,
    RemoveOptions, StatOptions, UploadInfo,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::folders::{FolderOps, MarkerFolders};
use crate::listing::ObjectListing;

/// Object-store client confined to one bucket and base prefix.
///
/// Every call takes paths relative to the base prefix, validates them
/// before any request is made, and returns keys in relative form.
pub struct Client {
    pub(crate) backend: Arc<dyn ObjectClient>,
    pub(crate) bucket: String,
    pub(crate) namespace: Namespace,
    pub(crate) public_base_url: Option<String>,
    folders: MarkerFolders,
}

impl Client {
    /// Validate `config` and confirm its bucket exists on `backend`.
    ///
    /// Fails with [`ClientError::Config`] for a missing required field, an
    /// invalid base prefix, or a bucket that does not exist.
    pub async fn new(config: ClientConfig, backend: Arc<dyn ObjectClient>) -> ClientResult<Self> {
        let namespace = config.validate()?;

        if !backend.bucket_exists(&config.bucket_name).await? {
            return Err(ClientError::Config(format!(
                "bucket {} does not exist",
                config.bucket_name
            )));
        }

        info!(
            endpoint = %config.endpoint,
            bucket = %config.bucket_name,
            "connected to object store"
        );

        let folders = MarkerFolders::new(
            Arc::clone(&backend),
            config.bucket_name.clone(),
            namespace.clone(),
        );
        Ok(Self {
            backend,
            bucket: config.bucket_name,
            namespace,
            public_base_url: config.public_url,
            folders,
        })
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    /// Normalized base prefix; empty when unconfined.
    pub fn base_dir_prefix(&self) -> &str {
        self.namespace.base_prefix()
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The folder emulator bound to this client's bucket and namespace.
    pub fn folders(&self) -> &MarkerFolders {
        &self.folders
    }

    // ---- Folders ----

    pub async fn folder_exists(&self, path: &str) -> ClientResult<bool> {
        self.folders.folder_exists(path).await
    }

    pub async fn create_folder(&self, path: &str) -> ClientResult<()> {
        self.folders.create_folder(path).await
    }

    pub async fn remove_folder(&self, path: &str) -> ClientResult<()> {
        self.folders.remove_folder(path).await
    }

    pub async fn list_folders(&self, prefix: &str) -> ClientResult<Vec<String>> {
        self.folders.list_folders(prefix).await
    }

    // ---- Objects ----

    /// Metadata of the object at `path`, with its key in relative form.
    pub async fn stat_object(&self, path: &str, opts: &StatOptions) -> ClientResult<ObjectInfo> {
        validate_path(path)?;
        let key = self.namespace.build_key(path);
        debug!(bucket = %self.bucket, object = %key, "getting object info");

        let mut info = self.backend.head_object(&self.bucket, &key, opts).await?;
        info.key = self.namespace.strip_key(&info.key);
        Ok(info)
    }

    pub async fn get_object(&self, path: &str, opts: &GetOptions) -> ClientResult<Bytes> {
        validate_path(path)?;
        let key = self.namespace.build_key(path);
        debug!(bucket = %self.bucket, object = %key, "getting object");

        Ok(self.backend.get_object(&self.bucket, &key, opts).await?)
    }

    pub async fn put_object(
        &self,
        path: &str,
        body: Bytes,
        opts: &PutOptions,
    ) -> ClientResult<UploadInfo> {
        validate_path(path)?;
        let key = self.namespace.build_key(path);
        debug!(bucket = %self.bucket, object = %key, size = body.len(), "putting object");

        let mut upload = self
            .backend
            .put_object(&self.bucket, &key, body, opts)
            .await?;
        upload.key = self.namespace.strip_key(&upload.key);
        Ok(upload)
    }

    pub async fn remove_object(&self, path: &str, opts: &RemoveOptions) -> ClientResult<()> {
        validate_path(path)?;
        let key = self.namespace.build_key(path);
        debug!(bucket = %self.bucket, object = %key, "removing object");

        Ok(self.backend.remove_object(&self.bucket, &key, opts).await?)
    }

    /// List objects under `prefix`; an empty prefix lists the whole namespace.
    ///
    /// The prefix matches keys textually, so `docs` also matches `docs2/x`.
    /// A trailing `/` is kept and confines the listing to one folder. An
    /// invalid prefix fails here, before any listing starts.
    pub fn list_objects(&self, prefix: &str, recursive: bool) -> ClientResult<ObjectListing> {
        let full_prefix = if prefix.is_empty() {
            self.namespace.listing_prefix(prefix)
        } else {
            validate_path(prefix)?;
            let key = self.namespace.build_key(prefix);
            if prefix.ends_with('/') || prefix.ends_with('\\') {
                format!("{key}/")
            } else {
                key
            }
        };
        debug!(
            bucket = %self.bucket,
            prefix = %full_prefix,
            recursive,
            "listing objects"
        );

        let upstream = self.backend.list_objects(
            &self.bucket,
            ListOptions {
                prefix: full_prefix,
                recursive,
            },
        );
        Ok(ObjectListing::relay(self.namespace.clone(), upstream))
    }

    /// Copy `src` to `dest`, both relative to the namespace.
    pub async fn copy_object(&self, dest: &str, src: &str) -> ClientResult<UploadInfo> {
        validate_path(dest)?;
        validate_path(src)?;
        let dest_key = self.namespace.build_key(dest);
        let src_key = self.namespace.build_key(src);
        debug!(bucket = %self.bucket, src = %src_key, dest = %dest_key, "copying object");

        let mut upload = self
            .backend
            .copy_object(
                &CopyDestination::new(&self.bucket, dest_key),
                &CopySource::new(&self.bucket, src_key),
            )
            .await?;
        upload.key = self.namespace.strip_key(&upload.key);
        Ok(upload)
    }

    /// Concatenate `sources` into `dest`.
    ///
    /// Sources in this client's bucket name relative paths and are
    /// translated into the namespace; sources in other buckets are used
    /// as given.
    pub async fn compose_object(
        &self,
        dest: &str,
        sources: &[CopySource],
        mut dest_opts: CopyDestination,
    ) -> ClientResult<UploadInfo> {
        validate_path(dest)?;
        let dest_key = self.namespace.build_key(dest);

        let mut resolved = Vec::with_capacity(sources.len());
        for src in sources {
            let mut src = src.clone();
            if src.bucket == self.bucket {
                validate_path(&src.key).map_err(|source| ClientError::InvalidSource {
                    path: src.key.clone(),
                    source,
                })?;
                src.key = self.namespace.build_key(&src.key);
            }
            resolved.push(src);
        }

        debug!(
            bucket = %self.bucket,
            dest = %dest_key,
            sources = resolved.len(),
            "composing object"
        );

        dest_opts.bucket = self.bucket.clone();
        dest_opts.key = dest_key;
        let mut upload = self.backend.compose_object(&dest_opts, &resolved).await?;
        upload.key = self.namespace.strip_key(&upload.key);
        Ok(upload)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("bucket", &self.bucket)
            .field("base_dir_prefix", &self.namespace.base_prefix())
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client, BUCKET};
    use bucketfs_path::PathError;
    use bucketfs_store::{InMemoryObjectClient, StoreError};

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn construction_requires_existing_bucket() {
        let backend = Arc::new(InMemoryObjectClient::new());
        let config = ClientConfig::new("e", "a", "s", "missing");
        let err = Client::new(config, backend).await.unwrap_err();
        assert!(matches!(err, ClientError::Config(ref m) if m.contains("missing")));
    }

    #[tokio::test]
    async fn construction_rejects_empty_required_fields() {
        let backend = Arc::new(InMemoryObjectClient::new().with_bucket(BUCKET));
        let config = ClientConfig::new("e", "", "s", BUCKET);
        assert!(matches!(
            Client::new(config, backend).await,
            Err(ClientError::Config(_))
        ));
    }

    #[tokio::test]
    async fn accessors() {
        let (_backend, c) = client("/app-data/").await;
        assert_eq!(c.bucket_name(), BUCKET);
        assert_eq!(c.base_dir_prefix(), "app-data");
        assert_eq!(c.public_base_url(), Some("http://localhost:9000/"));
        assert!(c.namespace().is_confined());
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_translates_key_both_ways() {
        let (backend, c) = client("app-data").await;
        let upload = c
            .put_object(
                "documents/hello.txt",
                Bytes::from_static(b"Hello, World!"),
                &PutOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(upload.key, "documents/hello.txt");
        assert_eq!(backend.object_keys(BUCKET), vec!["app-data/documents/hello.txt"]);

        let info = c
            .stat_object("documents/hello.txt", &StatOptions::default())
            .await
            .unwrap();
        assert_eq!(info.key, "documents/hello.txt");
        assert_eq!(info.size, 13);

        let body = c
            .get_object("documents/hello.txt", &GetOptions::default())
            .await
            .unwrap();
        assert_eq!(&body[..], b"Hello, World!");
    }

    #[tokio::test]
    async fn stat_of_missing_object_is_not_found() {
        let (_backend, c) = client("app").await;
        let err = c
            .stat_object("nope", &StatOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn invalid_paths_never_reach_storage() {
        let (backend, c) = client("app").await;
        let err = c
            .put_object("../escape", Bytes::new(), &PutOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Path(PathError::Traversal { .. })));
        assert!(matches!(
            c.get_object("/etc/passwd", &GetOptions::default()).await,
            Err(ClientError::Path(PathError::AbsolutePath { .. }))
        ));
        assert!(c.list_objects("a/../b", true).is_err());
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn remove_object_in_namespace() {
        let (backend, c) = client("app").await;
        c.put_object("x", Bytes::from_static(b"1"), &PutOptions::default())
            .await
            .unwrap();
        c.remove_object("x", &RemoveOptions::default()).await.unwrap();
        assert!(backend.object_keys(BUCKET).is_empty());
    }

    #[tokio::test]
    async fn copy_within_namespace() {
        let (backend, c) = client("app").await;
        c.put_object("a.txt", Bytes::from_static(b"abc"), &PutOptions::default())
            .await
            .unwrap();
        let upload = c.copy_object("b.txt", "a.txt").await.unwrap();
        assert_eq!(upload.key, "b.txt");
        assert_eq!(&backend.object_body(BUCKET, "app/b.txt").unwrap()[..], b"abc");
        assert!(c.copy_object("b.txt", "../a.txt").await.is_err());
    }

    #[tokio::test]
    async fn compose_translates_same_bucket_sources_only() {
        let (backend, c) = client("app").await;
        backend.create_bucket("other");
        backend
            .put_object("other", "raw", Bytes::from_static(b"!"), &PutOptions::default())
            .await
            .unwrap();
        for (path, body) in [("p1", &b"ab"[..]), ("p2", &b"cd"[..])] {
            c.put_object(path, Bytes::copy_from_slice(body), &PutOptions::default())
                .await
                .unwrap();
        }

        let sources = [
            CopySource::new(BUCKET, "p1"),
            CopySource::new(BUCKET, "p2"),
            CopySource::new("other", "raw"),
        ];
        let upload = c
            .compose_object("joined", &sources, CopyDestination::default())
            .await
            .unwrap();
        assert_eq!(upload.key, "joined");
        assert_eq!(&backend.object_body(BUCKET, "app/joined").unwrap()[..], b"abcd!");
    }

    #[tokio::test]
    async fn compose_names_the_invalid_source() {
        let (_backend, c) = client("app").await;
        let err = c
            .compose_object(
                "joined",
                &[CopySource::new(BUCKET, "../secret")],
                CopyDestination::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidSource { ref path, .. } if path == "../secret"));
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_objects_returns_relative_keys() {
        let (backend, c) = client("app").await;
        backend
            .put_object(BUCKET, "outside/z", Bytes::new(), &PutOptions::default())
            .await
            .unwrap();
        for path in ["docs/a.txt", "docs/b/c.txt", "img/x.png"] {
            c.put_object(path, Bytes::new(), &PutOptions::default())
                .await
                .unwrap();
        }

        let all = c.list_objects("", true).unwrap().collect().await.unwrap();
        let keys: Vec<_> = all.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["docs/a.txt", "docs/b/c.txt", "img/x.png"]);

        let root = c.list_objects("", false).unwrap().collect().await.unwrap();
        let keys: Vec<_> = root.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["docs/", "img/"]);

        let docs = c.list_objects("docs/", false).unwrap().collect().await.unwrap();
        let keys: Vec<_> = docs.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["docs/a.txt", "docs/b/"]);

        let bare = c.list_objects("docs", false).unwrap().collect().await.unwrap();
        let keys: Vec<_> = bare.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["docs/"]);
    }

    #[tokio::test]
    async fn listing_errors_are_relayed() {
        let backend = InMemoryObjectClient::new().with_bucket(BUCKET);
        let c = Client::new(
            ClientConfig::new("e", "a", "s", BUCKET),
            Arc::new(backend.clone()),
        )
        .await
        .unwrap();
        // Route a listing at a bucket that does not exist.
        let upstream = backend.list_objects("gone", ListOptions::default());
        let mut listing = ObjectListing::relay(c.namespace().clone(), upstream);
        assert!(matches!(
            listing.next().await,
            Some(Err(StoreError::BucketNotFound(_)))
        ));
    }

    // -----------------------------------------------------------------------
    // Folders through the client
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn folder_lifecycle() {
        let (_backend, c) = client("app").await;
        c.create_folder("f").await.unwrap();
        c.put_object("f/a", Bytes::new(), &PutOptions::default())
            .await
            .unwrap();
        c.put_object("f/b", Bytes::new(), &PutOptions::default())
            .await
            .unwrap();
        assert!(c.folder_exists("f").await.unwrap());
        assert_eq!(c.list_folders("").await.unwrap(), vec!["f"]);

        c.remove_folder("f").await.unwrap();
        assert!(!c.folder_exists("f").await.unwrap());
        let left = c.list_objects("f", true).unwrap().collect().await.unwrap();
        assert!(left.is_empty());
    }
}
