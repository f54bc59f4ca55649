//! Live query plumbing.
//!
//! Every committed write bumps a shared change counter. A live query holds a
//! receiver on that counter: it yields one snapshot immediately and a fresh
//! snapshot each time the counter moves. Snapshots are full result sets;
//! several writes landing between two polls collapse into one re-query.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::watch;

use crate::error::Result;

/// Stream of full result snapshots for one query shape.
pub type LiveQuery<T> = BoxStream<'static, Result<Vec<T>>>;

#[derive(Clone)]
pub struct ChangeNotifier {
    sender: Arc<watch::Sender<u64>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Marks the store as changed. Receivers are woken even if none exist yet.
    pub fn notify(&self) {
        self.sender.send_modify(|version| *version = version.wrapping_add(1));
        tracing::trace!(version = self.version(), "Store changed");
    }

    pub fn version(&self) -> u64 {
        *self.sender.borrow()
    }

    /// Builds a live query that re-runs `fetch` after every change.
    pub fn watch<T, F, Fut>(&self, fetch: F) -> LiveQuery<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        let receiver = self.sender.subscribe();

        stream::unfold(
            (receiver, fetch, true),
            |(mut receiver, fetch, first)| async move {
                if !first && receiver.changed().await.is_err() {
                    return None;
                }
                let pending = fetch();
                let snapshot = pending.await;
                Some((snapshot, (receiver, fetch, false)))
            },
        )
        .boxed()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// A live query that emits a single empty snapshot and never touches the store.
pub fn empty<T: Send + 'static>() -> LiveQuery<T> {
    stream::once(async { Ok(Vec::new()) }).boxed()
}
