use crate::api::JoinRequest;
use crate::domain::GameMode;
use crate::error::JoinError;

pub const DEFAULT_CURRENCY: &str = "PC";
/// Token sent for real-money joins when none was supplied.
pub const FALLBACK_REAL_TOKEN: &str = "1234";

/// Raw join inputs as they arrive from a route: path segments first, query second.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinParams {
    pub table_id: Option<String>,
    pub participant_id: Option<String>,
    pub path_currency: Option<String>,
    pub query_currency: Option<String>,
    pub path_mode: Option<String>,
    pub query_mode: Option<String>,
    pub path_token: Option<String>,
    pub query_token: Option<String>,
}

impl JoinParams {
    pub fn new(table_id: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            table_id: Some(table_id.into()),
            participant_id: Some(participant_id.into()),
            ..Self::default()
        }
    }

    /// Resolve currency, mode and token into the request that is sent (and coalesced).
    pub fn resolve(&self) -> Result<JoinRequest, JoinError> {
        let table_id = non_empty(&self.table_id).ok_or(JoinError::MissingIdentity)?;
        let participant_id = non_empty(&self.participant_id).ok_or(JoinError::MissingIdentity)?;

        let currency = non_empty(&self.path_currency)
            .or_else(|| non_empty(&self.query_currency))
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let explicit_mode = self
            .path_mode
            .as_deref()
            .and_then(GameMode::parse)
            .or_else(|| self.query_mode.as_deref().and_then(GameMode::parse));

        let path_token = self
            .path_token
            .as_deref()
            .filter(|token| !token.is_empty() && *token != "null");
        let query_token = self.query_token.as_deref().filter(|token| !token.is_empty());
        let token = path_token.or(query_token);

        let no_token = self.path_token.as_deref() == Some("null")
            || (self.path_token.is_none() && query_token.is_none());
        let mode = explicit_mode.unwrap_or(if no_token {
            GameMode::Demo
        } else {
            GameMode::Real
        });

        let token = match mode {
            GameMode::Real => Some(token.unwrap_or(FALLBACK_REAL_TOKEN).to_string()),
            GameMode::Demo => None,
        };

        Ok(JoinRequest {
            table_id,
            participant_id,
            currency,
            mode,
            token,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}
