//! Cooperative cancellation for in-flight method invocations.
//!
//! A dispatch call owns one handle; every invocation it starts gets a child.
//! Cancelling a parent reaches all of its children, never the reverse.

use futures::future::{self, FutureExt};
use tokio::sync::watch;

/// A cooperative cancellation handle.
///
/// Wraps a `tokio::sync::watch` channel. Clones share state; a child also
/// watches every ancestor's channel.
#[derive(Clone, Debug)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
    /// Own receiver first, then one per ancestor.
    watched: Vec<watch::Receiver<bool>>,
}

impl CancellationHandle {
    /// Create a new (not-yet-cancelled) handle.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx,
            watched: vec![rx],
        }
    }

    /// A handle cancelled together with `self`, but independently cancellable.
    pub fn child(&self) -> Self {
        let (tx, rx) = watch::channel(false);
        let mut watched = Vec::with_capacity(self.watched.len() + 1);
        watched.push(rx);
        watched.extend(self.watched.iter().cloned());
        Self { tx, watched }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// True when this handle or any ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.watched.iter().any(|rx| *rx.borrow())
    }

    /// Wait until this handle or any ancestor is cancelled.
    ///
    /// Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        let waits = self
            .watched
            .iter()
            .map(|rx| wait_for_cancel(rx.clone()).boxed());
        future::select_all(waits).await;
    }
}

async fn wait_for_cancel(mut rx: watch::Receiver<bool>) {
    // A dropped ancestor can no longer cancel anything.
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        future::pending::<()>().await;
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_new_handle_not_cancelled() {
        let handle = CancellationHandle::new();
        assert!(!handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_idempotent() {
        let handle = CancellationHandle::new();
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let handle = CancellationHandle::new();
        let clone = handle.clone();
        handle.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancels_children() {
        let parent = CancellationHandle::new();
        let child = parent.child();
        let grandchild = child.child();

        parent.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());

        tokio::time::timeout(Duration::from_millis(50), grandchild.cancelled())
            .await
            .expect("grandchild should observe the parent's cancellation");
    }

    #[tokio::test]
    async fn test_child_does_not_cancel_parent_or_siblings() {
        let parent = CancellationHandle::new();
        let first = parent.child();
        let second = parent.child();

        first.cancel();
        assert!(first.is_cancelled());
        assert!(!parent.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let handle = CancellationHandle::new();
        let child = handle.child();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });

        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("cancelled() should resolve within timeout");
    }
}
