//! Namespaced object-store client with folder emulation.
//!
//! A [`Client`] is confined to one bucket and an optional base prefix.
//! Callers address objects by relative paths such as
//! `documents/hello.txt`; the client validates them, rejects traversal
//! and absolute paths, prepends the base prefix on the way down and
//! strips it from every key on the way back.
//!
//! Flat object stores have no directories. [`MarkerFolders`] emulates them
//! with a zero-byte `<folder>/.empty` marker object:
//!
//! - a folder *exists* when its marker exists
//! - a folder is *listed* when any object lives under it
//! - removing a folder removes everything under it
//!
//! The two existence notions differ on purpose. A prefix holding objects
//! but no marker appears in [`Client::list_folders`] while
//! [`Client::folder_exists`] reports `false`.
//!
//! Storage access goes through [`bucketfs_store::ObjectClient`], so the
//! same client runs against the in-memory backend in tests and against a
//! real store in production.

pub mod advanced;
pub mod buckets;
pub mod client;
pub mod config;
pub mod error;
pub mod folders;
pub mod listing;
mod task;
pub mod urls;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use folders::{FolderOps, MarkerFolders};
pub use listing::ObjectListing;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use bucketfs_store::InMemoryObjectClient;

    use crate::{Client, ClientConfig};

    pub const BUCKET: &str = "uploads";

    /// A client over a fresh in-memory backend with `BUCKET` created.
    pub async fn client(base: &str) -> (InMemoryObjectClient, Client) {
        let backend = InMemoryObjectClient::new().with_bucket(BUCKET);
        let config = ClientConfig::new("localhost:9000", "minio", "minio123", BUCKET)
            .with_base_dir_prefix(base)
            .with_public_url("http://localhost:9000/");
        let client = Client::new(config, Arc::new(backend.clone()))
            .await
            .expect("client");
        (backend, client)
    }
}
