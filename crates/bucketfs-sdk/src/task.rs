use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::{JoinError, JoinHandle};

/// A spawned pipeline stage that is aborted when its owner goes away.
///
/// Awaiting the guard yields the task's output. Dropping it before the task
/// finishes aborts the task, which drops whatever channels the task holds
/// and so stops the stages upstream of it.
pub(crate) struct TaskGuard<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> TaskGuard<T> {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }
}

impl<T> TaskGuard<T> {
    pub(crate) fn abort(&self) {
        self.handle.abort();
    }
}

impl<T> Future for TaskGuard<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}

impl<T> Drop for TaskGuard<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn awaiting_yields_output() {
        let guard = TaskGuard::spawn(async { 7 });
        assert_eq!(guard.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn dropping_aborts_the_task() {
        let (tx, rx) = oneshot::channel::<()>();
        let guard = TaskGuard::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            let _ = tx.send(());
        });
        drop(guard);
        // The aborted task drops its sender without sending.
        assert!(rx.await.is_err());
    }
}
