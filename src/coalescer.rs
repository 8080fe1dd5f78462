//! Single-flight execution of async operations keyed by request identity.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::error::SyncError;
use crate::tokio_tools::spawn_named_task;

const LOG_TARGET: &str = "table_sync::coalescer";

type PendingOutcome<T> = Shared<BoxFuture<'static, Result<T, SyncError>>>;

/// Position in a registry's launch order. Work launched after a ticket was taken
/// carries a sequence number at or above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

struct Pending<T> {
    seq: u64,
    outcome: PendingOutcome<T>,
}

/// Registry of in-flight operations.
///
/// Concurrent callers presenting the same key share one execution and observe the
/// same outcome. The entry is dropped as soon as the operation settles, so the next
/// call for that key starts fresh work.
pub struct RequestCoalescer<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    inflight: Arc<DashMap<K, Pending<T>>>,
    launched: AtomicU64,
}

impl<K, T> RequestCoalescer<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
            launched: AtomicU64::new(0),
        }
    }

    /// Run `operation` unless an identical request is already pending, in which case
    /// its outcome is awaited instead.
    ///
    /// The operation runs on its own task so it settles (and releases its key) even
    /// if every caller stops waiting.
    pub async fn run<F, Fut>(&self, key: K, operation: F) -> Result<T, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        self.share(key, None, operation).await
    }

    /// Take a ticket before reacting to a change.
    pub fn ticket(&self) -> Ticket {
        Ticket(self.launched.load(Ordering::SeqCst))
    }

    /// Like [`RequestCoalescer::run`], but only joins work launched at or after
    /// `since`. Older pending work may have read state from before the change the
    /// caller is reacting to; it is superseded by a fresh launch that takes over
    /// the key.
    pub async fn run_since<F, Fut>(&self, key: K, since: Ticket, operation: F) -> Result<T, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        self.share(key, Some(since), operation).await
    }

    async fn share<F, Fut>(&self, key: K, since: Option<Ticket>, operation: F) -> Result<T, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        let pending = match self.inflight.entry(key.clone()) {
            Entry::Occupied(mut existing) => {
                let fresh_enough = since.map_or(true, |Ticket(since)| existing.get().seq >= since);
                if fresh_enough {
                    debug!(target = LOG_TARGET, ?key, "joining in-flight request");
                    existing.get().outcome.clone()
                } else {
                    debug!(target = LOG_TARGET, ?key, "superseding request launched before ticket");
                    let launched = self.launch(&key, operation);
                    let outcome = launched.outcome.clone();
                    existing.insert(launched);
                    outcome
                }
            }
            Entry::Vacant(slot) => {
                debug!(target = LOG_TARGET, ?key, "starting request");
                let launched = self.launch(&key, operation);
                let outcome = launched.outcome.clone();
                slot.insert(launched);
                outcome
            }
        };

        pending.await
    }

    fn launch<F, Fut>(&self, key: &K, operation: F) -> Pending<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        let seq = self.launched.fetch_add(1, Ordering::SeqCst);
        let registry = Arc::clone(&self.inflight);
        let settle_key = key.clone();
        let work = operation();
        let handle = spawn_named_task("coalesced-request", async move {
            let outcome = work.await;
            // A superseding launch may own the key by now.
            registry.remove_if(&settle_key, |_, pending| pending.seq == seq);
            outcome
        });
        let outcome: PendingOutcome<T> = async move {
            handle
                .await
                .unwrap_or_else(|err| Err(SyncError::TaskAborted(err.to_string())))
        }
        .boxed()
        .shared();
        Pending { seq, outcome }
    }

    /// Number of keys with an operation still pending.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.inflight.contains_key(key)
    }
}

impl<K, T> Default for RequestCoalescer<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
