use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

use crate::api::{ApiRoutes, HttpTableApi};
use crate::realtime::{FirebaseChangeChannel, FirebaseChannelConfig};
use crate::sync::WriterRole;
use crate::table::TableClient;

pub const API_HOST_ENV: &str = "TABLE_API_HOST";
pub const REALTIME_URL_ENV: &str = "REALTIME_DB_URL";
pub const REALTIME_AUTH_ENV: &str = "REALTIME_DB_AUTH";
pub const WRITER_ROLE_ENV: &str = "CLIENT_WRITER_ROLE";
pub const HTTP_TIMEOUT_ENV: &str = "CLIENT_HTTP_TIMEOUT_SECS";
pub const RECONNECT_DELAY_ENV: &str = "REALTIME_RECONNECT_SECS";

/// Everything needed to build a [`TableClient`] against live services.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub routes: ApiRoutes,
    pub realtime_url: Url,
    pub realtime_auth: Option<String>,
    pub http_timeout: Duration,
    pub handshake_timeout: Duration,
    pub reconnect_delay: Duration,
    pub broadcast_capacity: usize,
    pub writer_role: WriterRole,
}

impl ClientConfig {
    pub fn new(api_host: &str, realtime_url: &str) -> Result<Self> {
        let routes = ApiRoutes::new(api_host).context("invalid table API host")?;
        let realtime_url = Url::parse(realtime_url).context("invalid realtime database URL")?;
        Ok(Self {
            routes,
            realtime_url,
            realtime_auth: None,
            http_timeout: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            broadcast_capacity: 64,
            writer_role: WriterRole::default(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_host = get(API_HOST_ENV)
            .ok_or_else(|| anyhow!("environment variable {API_HOST_ENV} not set"))?;
        let realtime_url = get(REALTIME_URL_ENV)
            .ok_or_else(|| anyhow!("environment variable {REALTIME_URL_ENV} not set"))?;
        let mut config = Self::new(&api_host, &realtime_url)?;

        config.realtime_auth = get(REALTIME_AUTH_ENV);
        if let Some(raw) = get(WRITER_ROLE_ENV) {
            config.writer_role = raw
                .parse()
                .map_err(|err: String| anyhow!(err))
                .with_context(|| format!("invalid {WRITER_ROLE_ENV}"))?;
        }
        if let Some(raw) = get(HTTP_TIMEOUT_ENV) {
            config.http_timeout = parse_secs(HTTP_TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = get(RECONNECT_DELAY_ENV) {
            config.reconnect_delay = parse_secs(RECONNECT_DELAY_ENV, &raw)?;
        }
        Ok(config)
    }

    pub fn channel_config(&self) -> FirebaseChannelConfig {
        let mut cfg = FirebaseChannelConfig::new(self.realtime_url.clone());
        cfg.auth = self.realtime_auth.clone();
        cfg.handshake_timeout = self.handshake_timeout;
        cfg.reconnect_delay = self.reconnect_delay;
        cfg.broadcast_capacity = self.broadcast_capacity;
        cfg
    }

    /// HTTP table API plus realtime database channel.
    pub fn build_client(&self) -> Result<TableClient> {
        let api = HttpTableApi::new(self.routes.clone(), self.http_timeout)
            .context("failed to build table API client")?;
        let channel = FirebaseChangeChannel::new(self.channel_config())
            .context("failed to build realtime channel")?;
        Ok(TableClient::new(Arc::new(api), Arc::new(channel)).with_role(self.writer_role))
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number of seconds"))?;
    Ok(Duration::from_secs(secs))
}
