use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::SyncError;

use super::{ChangeChannel, FlagSubscription, SyncFlag};

const LOG_TARGET: &str = "table_sync::realtime::in_memory";
const TOPIC_CAPACITY: usize = 64;

/// Process-local change channel. Several watchers may share one instance to stand
/// in for several open clients.
pub struct InMemoryChangeChannel {
    records: DashMap<String, Value>,
    topics: DashMap<String, broadcast::Sender<SyncFlag>>,
    clears: AtomicUsize,
    fail_clears: AtomicBool,
    fail_reads: AtomicBool,
}

impl InMemoryChangeChannel {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            topics: DashMap::new(),
            clears: AtomicUsize::new(0),
            fail_clears: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    fn topic(&self, session_id: &str) -> broadcast::Sender<SyncFlag> {
        self.topics
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    /// Server side: raise `shouldSync` and notify subscribers.
    pub fn request_sync(&self, session_id: &str) {
        self.write_flag(session_id, true);
    }

    /// Deliver a notification without touching the stored record, as a duplicate
    /// delivery from the transport would.
    pub fn notify(&self, session_id: &str, flag: SyncFlag) {
        let _ = self.topic(session_id).send(flag);
    }

    pub fn should_sync(&self, session_id: &str) -> bool {
        self.records
            .get(session_id)
            .map(|record| SyncFlag::from_record(record.value()).should_sync)
            .unwrap_or(false)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.topics
            .get(session_id)
            .map(|topic| topic.receiver_count())
            .unwrap_or(0)
    }

    pub fn fail_clears(&self, fail: bool) {
        self.fail_clears.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn write_flag(&self, session_id: &str, should_sync: bool) {
        let flag = {
            let mut record = self
                .records
                .entry(session_id.to_string())
                .or_insert_with(|| json!({}));
            if let Some(map) = record.value_mut().as_object_mut() {
                map.insert("shouldSync".to_string(), Value::Bool(should_sync));
            }
            SyncFlag::from_record(record.value())
        };
        debug!(target = LOG_TARGET, session_id, should_sync, "flag written");
        let _ = self.topic(session_id).send(flag);
    }
}

impl Default for InMemoryChangeChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeChannel for InMemoryChangeChannel {
    async fn subscribe(&self, session_id: &str) -> Result<FlagSubscription, SyncError> {
        Ok(FlagSubscription::new(self.topic(session_id).subscribe()))
    }

    async fn read(&self, session_id: &str) -> Result<SyncFlag, SyncError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::channel("synthetic read failure"));
        }
        Ok(self
            .records
            .get(session_id)
            .map(|record| SyncFlag::from_record(record.value()))
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<(), SyncError> {
        if self.fail_clears.load(Ordering::SeqCst) {
            return Err(SyncError::channel("synthetic clear failure"));
        }
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.write_flag(session_id, false);
        Ok(())
    }
}
