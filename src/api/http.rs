use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::domain::TableConfig;
use crate::error::SyncError;

use super::dto::{ActionSubmission, ErrorBody, JoinRequest, StateQuery};
use super::routes::ApiRoutes;
use super::TableApi;

const LOG_TARGET: &str = "table_sync::api::http";

/// `TableApi` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTableApi {
    client: Client,
    routes: ApiRoutes,
}

impl HttpTableApi {
    pub fn new(routes: ApiRoutes, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SyncError::transport)?;
        Ok(Self { client, routes })
    }

    pub fn routes(&self) -> &ApiRoutes {
        &self.routes
    }

    async fn send(&self, url: Url, request: RequestBuilder) -> Result<Value, SyncError> {
        debug!(target = LOG_TARGET, %url, "sending request");
        let response = request.send().await.map_err(|err| {
            warn!(target = LOG_TARGET, %url, error = %err, "request failed");
            SyncError::transport(err)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.unwrap_or_default();
            warn!(
                target = LOG_TARGET,
                %url,
                status = status.as_u16(),
                message = body.message.as_deref().unwrap_or(""),
                "request rejected"
            );
            return Err(SyncError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: body.message,
            });
        }

        let bytes = response.bytes().await.map_err(SyncError::transport)?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(SyncError::decode)
    }
}

/// The table endpoint answers either `{data: config}` or the bare config.
fn parse_table_config(body: Value) -> Result<TableConfig, SyncError> {
    let config = match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            _ => Value::Object(map),
        },
        other => other,
    };
    serde_json::from_value(config).map_err(SyncError::decode)
}

#[async_trait]
impl TableApi for HttpTableApi {
    async fn fetch_table(&self, table_id: &str) -> Result<TableConfig, SyncError> {
        let url = self.routes.table(table_id);
        let body = self.send(url.clone(), self.client.get(url)).await?;
        parse_table_config(body)
    }

    async fn join_table(&self, request: &JoinRequest) -> Result<Value, SyncError> {
        let url = self
            .routes
            .join(&request.table_id, &request.participant_id);
        let builder = self.client.post(url.clone()).json(&request.body());
        self.send(url, builder).await
    }

    async fn fetch_state(&self, query: &StateQuery) -> Result<Value, SyncError> {
        let url = self.routes.state(query);
        self.send(url.clone(), self.client.get(url)).await
    }

    async fn submit_action(&self, submission: &ActionSubmission) -> Result<(), SyncError> {
        let url = self.routes.submit_action();
        let builder = self.client.post(url.clone()).json(submission);
        self.send(url, builder).await.map(|_| ())
    }
}
