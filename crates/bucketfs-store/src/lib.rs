//! Object-storage client contract for bucketfs.
//!
//! The namespace and folder layers above this crate never talk to a wire
//! protocol directly. They go through [`ObjectClient`], an async trait
//! shaped after the S3 object API: bucket + fully-qualified key +
//! options, with listings and bulk removals delivered as live channels.
//!
//! # Backends
//!
//! - [`InMemoryObjectClient`] -- `BTreeMap`-based store for tests and
//!   embedding, with fault injection
//! - [`FsObjectClient`] -- one file per object under a local directory
//!
//! # Contract
//!
//! 1. A missing key is [`StoreError::NotFound`]; callers use it as a
//!    control-flow value, so backends must not fold it into other errors.
//! 2. Listings come back in lexicographic key order. Non-recursive
//!    listings roll deeper keys into common-prefix entries ending in `/`.
//! 3. Streaming calls never block the caller; dropping a receiver stops
//!    the task that feeds it.
//! 4. No retries happen here or above; a backend that wants them owns them.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectClient;
pub use memory::InMemoryObjectClient;
pub use traits::ObjectClient;
pub use types::{
    BucketInfo, CopyDestination, CopySource, GetOptions, LegalHoldOptions, LegalHoldStatus,
    ListOptions, ObjectInfo, ObjectInfoReceiver, PresignMethod, PutLegalHoldOptions, PutOptions,
    PutRetentionOptions, RemovalFailure, RemovalReceiver, RemoveOptions, Retention,
    RetentionMode, StatOptions, TaggingOptions, Tags, UploadInfo, STREAM_CHANNEL_CAPACITY,
};
