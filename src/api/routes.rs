use url::Url;

use crate::error::SyncError;

use super::dto::StateQuery;

/// URL builder for the table and game endpoints.
#[derive(Debug, Clone)]
pub struct ApiRoutes {
    base: Url,
}

impl ApiRoutes {
    /// `host` may be given with a trailing `/api/game`, which is stripped.
    pub fn new(host: &str) -> Result<Self, SyncError> {
        let trimmed = host.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix("/api/game").unwrap_or(trimmed);
        let base = Url::parse(trimmed)
            .map_err(|err| SyncError::transport(format!("invalid API host {host}: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(SyncError::transport(format!(
                "API host {host} cannot carry a path"
            )));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn table(&self, table_id: &str) -> Url {
        self.endpoint(&["api", "tables", table_id])
    }

    pub fn join(&self, table_id: &str, participant_id: &str) -> Url {
        self.endpoint(&[
            "api",
            "game",
            "tables",
            table_id,
            "players",
            participant_id,
            "join",
        ])
    }

    pub fn state(&self, query: &StateQuery) -> Url {
        let mut url = self.endpoint(&["api", "game", "tables", &query.table_id, "state"]);
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("playerId", &query.participant_id);
            if let Some(session_id) = query.session_id.as_deref().filter(|s| !s.is_empty()) {
                params.append_pair("sessionId", session_id);
            }
            if let Some(currency) = query.currency.as_deref().filter(|c| !c.is_empty()) {
                params.append_pair("currency", currency);
            }
            if let Some(mode) = query.mode {
                params.append_pair("mode", mode.as_str());
            }
        }
        url
    }

    pub fn submit_action(&self) -> Url {
        self.endpoint(&["api", "game", "action"])
    }
}
