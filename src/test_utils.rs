//! Shared fakes for the sync and table tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::watch;

use crate::api::{ActionSubmission, JoinRequest, StateQuery, TableApi};
use crate::domain::TableConfig;
use crate::error::SyncError;

/// Let every runnable task make progress on the current-thread test runtime.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Scripted `TableApi`.
///
/// Calls are counted on entry, then wait on the gate (open by default) before
/// answering with the configured body or failure. State fetches capture their
/// body on entry, so a held fetch answers with the state as it was when called.
pub struct FakeTableApi {
    gate: watch::Sender<bool>,
    table: Mutex<Value>,
    join: Mutex<Value>,
    state: Mutex<Value>,
    table_calls: AtomicUsize,
    join_calls: AtomicUsize,
    state_calls: AtomicUsize,
    fail_table: Mutex<Option<SyncError>>,
    fail_join: Mutex<Option<SyncError>>,
    fail_state: AtomicBool,
    fail_submit: Mutex<Option<SyncError>>,
    joins: Mutex<Vec<JoinRequest>>,
    queries: Mutex<Vec<StateQuery>>,
    submissions: Mutex<Vec<ActionSubmission>>,
}

impl FakeTableApi {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            gate,
            table: Mutex::new(json!({ "data": { "seatCount": 6, "smallBlind": 5, "bigBlind": 10 } })),
            join: Mutex::new(Value::Null),
            state: Mutex::new(Value::Null),
            table_calls: AtomicUsize::new(0),
            join_calls: AtomicUsize::new(0),
            state_calls: AtomicUsize::new(0),
            fail_table: Mutex::new(None),
            fail_join: Mutex::new(None),
            fail_state: AtomicBool::new(false),
            fail_submit: Mutex::new(None),
            joins: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// Park every subsequent call until [`FakeTableApi::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn set_join(&self, body: Value) {
        *self.join.lock() = body;
    }

    pub fn set_state(&self, body: Value) {
        *self.state.lock() = body;
    }

    pub fn fail_table_with(&self, err: Option<SyncError>) {
        *self.fail_table.lock() = err;
    }

    pub fn fail_join_with(&self, err: Option<SyncError>) {
        *self.fail_join.lock() = err;
    }

    pub fn fail_state(&self, fail: bool) {
        self.fail_state.store(fail, Ordering::SeqCst);
    }

    pub fn fail_submit_with(&self, err: Option<SyncError>) {
        *self.fail_submit.lock() = err;
    }

    pub fn table_calls(&self) -> usize {
        self.table_calls.load(Ordering::SeqCst)
    }

    pub fn join_calls(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    pub fn state_calls(&self) -> usize {
        self.state_calls.load(Ordering::SeqCst)
    }

    pub fn joins(&self) -> Vec<JoinRequest> {
        self.joins.lock().clone()
    }

    pub fn queries(&self) -> Vec<StateQuery> {
        self.queries.lock().clone()
    }

    pub fn submissions(&self) -> Vec<ActionSubmission> {
        self.submissions.lock().clone()
    }

    async fn pass_gate(&self) {
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
    }
}

impl Default for FakeTableApi {
    fn default() -> Self {
        Self::new()
    }
}

/// Error shaped like a rejected HTTP call carrying a server message.
pub fn rejected(status: u16, message: &str) -> SyncError {
    SyncError::Status {
        url: "http://fake/api".into(),
        status,
        message: Some(message.into()),
    }
}

#[async_trait]
impl TableApi for FakeTableApi {
    async fn fetch_table(&self, _table_id: &str) -> Result<TableConfig, SyncError> {
        self.table_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        if let Some(err) = self.fail_table.lock().clone() {
            return Err(err);
        }
        let body = self.table.lock().clone();
        let config = body.get("data").cloned().unwrap_or(body);
        serde_json::from_value(config).map_err(SyncError::decode)
    }

    async fn join_table(&self, request: &JoinRequest) -> Result<Value, SyncError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        self.joins.lock().push(request.clone());
        self.pass_gate().await;
        if let Some(err) = self.fail_join.lock().clone() {
            return Err(err);
        }
        Ok(self.join.lock().clone())
    }

    async fn fetch_state(&self, query: &StateQuery) -> Result<Value, SyncError> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.clone());
        let body = self.state.lock().clone();
        self.pass_gate().await;
        if self.fail_state.load(Ordering::SeqCst) {
            return Err(SyncError::transport("synthetic state failure"));
        }
        Ok(body)
    }

    async fn submit_action(&self, submission: &ActionSubmission) -> Result<(), SyncError> {
        self.submissions.lock().push(submission.clone());
        self.pass_gate().await;
        if let Some(err) = self.fail_submit.lock().clone() {
            return Err(err);
        }
        Ok(())
    }
}
