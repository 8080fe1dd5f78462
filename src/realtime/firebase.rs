use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client, Response};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::SyncError;
use crate::tokio_tools::spawn_named_task;

use super::sse::{PathData, RecordMirror, SseDecoder, SseEvent};
use super::{ChangeChannel, FlagSubscription, SyncFlag};

const LOG_TARGET: &str = "table_sync::realtime::firebase";

#[derive(Debug, Clone)]
pub struct FirebaseChannelConfig {
    pub database_url: Url,
    pub auth: Option<String>,
    pub root: String,
    pub handshake_timeout: Duration,
    pub reconnect_delay: Duration,
    pub broadcast_capacity: usize,
}

impl FirebaseChannelConfig {
    pub fn new(database_url: Url) -> Self {
        Self {
            database_url,
            auth: None,
            root: "poker/gamestate".to_string(),
            handshake_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            broadcast_capacity: 64,
        }
    }

    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// REST location of one session's sync record.
    pub fn record_url(&self, session_id: &str) -> Url {
        let mut url = self.database_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(self.root.split('/').filter(|s| !s.is_empty()));
            path.push(&format!("{session_id}.json"));
        }
        if let Some(auth) = self.auth.as_deref() {
            url.query_pairs_mut().append_pair("auth", auth);
        }
        url
    }
}

/// Change channel backed by the realtime database's REST streaming interface.
#[derive(Debug, Clone)]
pub struct FirebaseChangeChannel {
    cfg: FirebaseChannelConfig,
    client: Client,
}

impl FirebaseChangeChannel {
    pub fn new(cfg: FirebaseChannelConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .connect_timeout(cfg.handshake_timeout)
            .build()
            .map_err(SyncError::transport)?;
        Ok(Self { cfg, client })
    }

    pub fn config(&self) -> &FirebaseChannelConfig {
        &self.cfg
    }
}

#[async_trait]
impl ChangeChannel for FirebaseChangeChannel {
    async fn subscribe(&self, session_id: &str) -> Result<FlagSubscription, SyncError> {
        let (tx, rx) = broadcast::channel(self.cfg.broadcast_capacity);
        let stop = CancellationToken::new();
        let stream = RecordStream {
            client: self.client.clone(),
            url: self.cfg.record_url(session_id),
            session_id: session_id.to_string(),
            handshake_timeout: self.cfg.handshake_timeout,
            reconnect_delay: self.cfg.reconnect_delay,
            tx,
            stop: stop.clone(),
        };
        spawn_named_task("sync-flag-stream", async move {
            if let Err(err) = stream.run().await {
                warn!(target = LOG_TARGET, error = %err, "sync flag stream terminated");
            }
        });
        Ok(FlagSubscription::new(rx).with_stop_guard(stop.drop_guard()))
    }

    async fn read(&self, session_id: &str) -> Result<SyncFlag, SyncError> {
        let url = self.cfg.record_url(session_id);
        let response = self
            .client
            .get(url)
            .timeout(self.cfg.handshake_timeout)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(SyncError::channel)?;
        let record: Value = response.json().await.map_err(SyncError::decode)?;
        Ok(SyncFlag::from_record(&record))
    }

    async fn clear(&self, session_id: &str) -> Result<(), SyncError> {
        let url = self.cfg.record_url(session_id);
        self.client
            .patch(url)
            .timeout(self.cfg.handshake_timeout)
            .json(&json!({ "shouldSync": false }))
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(SyncError::channel)?;
        debug!(target = LOG_TARGET, session_id, "sync flag cleared");
        Ok(())
    }
}

/// Background reader for one session's event stream; reconnects until stopped.
struct RecordStream {
    client: Client,
    url: Url,
    session_id: String,
    handshake_timeout: Duration,
    reconnect_delay: Duration,
    tx: broadcast::Sender<SyncFlag>,
    stop: CancellationToken,
}

impl RecordStream {
    async fn run(self) -> Result<()> {
        info!(
            target = LOG_TARGET,
            session_id = %self.session_id,
            "starting sync flag stream"
        );
        while !self.stop.is_cancelled() {
            match self.connect().await {
                Ok(response) => {
                    if let Err(err) = self.pump(response).await {
                        warn!(target = LOG_TARGET, error = %err, "event stream ended with error");
                    }
                }
                Err(err) => {
                    warn!(target = LOG_TARGET, error = %err, "failed to open event stream");
                }
            }

            if self.stop.is_cancelled() {
                break;
            }

            debug!(
                target = LOG_TARGET,
                delay_secs = self.reconnect_delay.as_secs_f32(),
                "waiting before reconnect attempt"
            );
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = sleep(self.reconnect_delay) => {}
            }
        }

        info!(
            target = LOG_TARGET,
            session_id = %self.session_id,
            "sync flag stream stopped"
        );
        Ok(())
    }

    async fn connect(&self) -> Result<Response> {
        let request = self
            .client
            .get(self.url.clone())
            .header(header::ACCEPT, "text/event-stream")
            .send();
        let response = timeout(self.handshake_timeout, request)
            .await
            .context("event stream handshake timed out")?
            .context("event stream handshake failed")?;
        response
            .error_for_status()
            .context("event stream rejected")
    }

    async fn pump(&self, response: Response) -> Result<()> {
        let mut source = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut mirror = RecordMirror::default();

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => {
                    debug!(target = LOG_TARGET, "shutdown signal received");
                    return Ok(());
                }
                chunk = source.next() => {
                    match chunk {
                        Some(Ok(bytes)) => {
                            for event in decoder.push(&bytes) {
                                self.handle_event(&mut mirror, event)?;
                            }
                        }
                        Some(Err(err)) => {
                            return Err(err).context("event stream read failed");
                        }
                        None => {
                            debug!(target = LOG_TARGET, "event stream ended");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn handle_event(&self, mirror: &mut RecordMirror, event: SseEvent) -> Result<()> {
        match event.event.as_str() {
            "put" | "patch" => {
                let body: PathData = match serde_json::from_str(&event.data) {
                    Ok(body) => body,
                    Err(err) => {
                        warn!(target = LOG_TARGET, error = %err, "malformed event payload");
                        return Ok(());
                    }
                };
                if event.event == "put" {
                    mirror.put(&body.path, body.data);
                } else {
                    mirror.patch(&body.path, body.data);
                }
                let _ = self.tx.send(SyncFlag::from_record(mirror.value()));
                Ok(())
            }
            "keep-alive" => Ok(()),
            "cancel" => Err(anyhow!("stream cancelled by server: {}", event.data)),
            "auth_revoked" => Err(anyhow!("stream credential revoked")),
            other => {
                debug!(target = LOG_TARGET, event = other, "ignoring stream event");
                Ok(())
            }
        }
    }
}
