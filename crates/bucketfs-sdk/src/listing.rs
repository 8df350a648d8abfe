use tokio::sync::mpsc;

use bucketfs_path::Namespace;
use bucketfs_store::{ObjectInfo, ObjectInfoReceiver, StoreResult, STREAM_CHANNEL_CAPACITY};

use crate::task::TaskGuard;

/// Live listing whose keys are relative to the client's namespace.
///
/// A background relay reads the backend listing and republishes each entry
/// as soon as it arrives, stripping the base prefix from successful entries.
/// Errors are forwarded unmodified. The listing is not restartable; call
/// [`Client::list_objects`](crate::Client::list_objects) again to re-list.
///
/// Dropping the listing, or calling [`ObjectListing::cancel`], aborts the
/// relay and with it the backend listing.
pub struct ObjectListing {
    rx: ObjectInfoReceiver,
    relay: TaskGuard<()>,
}

impl ObjectListing {
    pub(crate) fn relay(namespace: Namespace, mut upstream: ObjectInfoReceiver) -> Self {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let relay = TaskGuard::spawn(async move {
            while let Some(item) = upstream.recv().await {
                let item = item.map(|mut info| {
                    info.key = namespace.strip_key(&info.key);
                    info
                });
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });
        Self { rx, relay }
    }

    /// Next entry, or `None` once the listing is exhausted or cancelled.
    pub async fn next(&mut self) -> Option<StoreResult<ObjectInfo>> {
        self.rx.recv().await
    }

    /// Stop the relay. Entries already buffered are discarded.
    pub fn cancel(&mut self) {
        self.relay.abort();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    /// Drain the listing, stopping at the first error.
    pub async fn collect(mut self) -> StoreResult<Vec<ObjectInfo>> {
        let mut entries = Vec::new();
        while let Some(item) = self.next().await {
            entries.push(item?);
        }
        Ok(entries)
    }
}

impl std::fmt::Debug for ObjectListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectListing").finish_non_exhaustive()
    }
}
