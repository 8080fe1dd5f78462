//! Push channel carrying the per-session `shouldSync` flag.

pub mod firebase;
pub mod in_memory;
pub mod sse;

pub use firebase::{FirebaseChangeChannel, FirebaseChannelConfig};
pub use in_memory::InMemoryChangeChannel;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::DropGuard;
use tracing::warn;

use crate::error::SyncError;

const LOG_TARGET: &str = "table_sync::realtime";

/// Value of the shared flag as seen by one notification or read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncFlag {
    pub should_sync: bool,
}

impl SyncFlag {
    pub const RAISED: SyncFlag = SyncFlag { should_sync: true };
    pub const LOWERED: SyncFlag = SyncFlag { should_sync: false };

    /// Only a literal `true` requests a sync; anything else means nothing to do.
    pub fn from_record(record: &Value) -> Self {
        Self {
            should_sync: matches!(record.get("shouldSync"), Some(Value::Bool(true))),
        }
    }
}

/// Live feed of flag values for one session. Dropping it unsubscribes.
pub struct FlagSubscription {
    rx: broadcast::Receiver<SyncFlag>,
    _stop: Option<DropGuard>,
}

impl FlagSubscription {
    pub fn new(rx: broadcast::Receiver<SyncFlag>) -> Self {
        Self { rx, _stop: None }
    }

    /// Ties the lifetime of a background feeder to this subscription.
    pub fn with_stop_guard(mut self, guard: DropGuard) -> Self {
        self._stop = Some(guard);
        self
    }

    /// Next notification, or `None` once the channel has closed.
    pub async fn next(&mut self) -> Option<SyncFlag> {
        loop {
            match self.rx.recv().await {
                Ok(flag) => return Some(flag),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target = LOG_TARGET, skipped, "flag subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Subscribe, one-shot read and conditional clear of the per-session flag.
#[async_trait]
pub trait ChangeChannel: Send + Sync {
    async fn subscribe(&self, session_id: &str) -> Result<FlagSubscription, SyncError>;

    async fn read(&self, session_id: &str) -> Result<SyncFlag, SyncError>;

    /// Set `shouldSync = false`. Idempotent.
    async fn clear(&self, session_id: &str) -> Result<(), SyncError>;
}
