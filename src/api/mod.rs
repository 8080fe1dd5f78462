//! Table and session REST endpoints.

pub mod dto;
pub mod http;
pub mod routes;

pub use dto::{ActionSubmission, JoinRequest, Snapshot, StateQuery};
pub use http::HttpTableApi;
pub use routes::ApiRoutes;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::TableConfig;
use crate::error::SyncError;

/// Abstraction over the game server's REST surface.
///
/// Join and state reads return the raw body; callers unwrap it with
/// [`Snapshot::from_body`].
#[async_trait]
pub trait TableApi: Send + Sync {
    async fn fetch_table(&self, table_id: &str) -> Result<TableConfig, SyncError>;

    async fn join_table(&self, request: &JoinRequest) -> Result<Value, SyncError>;

    async fn fetch_state(&self, query: &StateQuery) -> Result<Value, SyncError>;

    async fn submit_action(&self, submission: &ActionSubmission) -> Result<(), SyncError>;
}
