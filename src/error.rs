use thiserror::Error;

/// Failures raised while talking to the table API or the change channel.
///
/// Cloneable so a single coalesced outcome can be handed to every waiting caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request to {url} failed with status {status}")]
    Status {
        url: String,
        status: u16,
        message: Option<String>,
    },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("change channel error: {0}")]
    Channel(String),
    #[error("background task ended unexpectedly: {0}")]
    TaskAborted(String),
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
}

impl SyncError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    pub fn channel(err: impl std::fmt::Display) -> Self {
        Self::Channel(err.to_string())
    }

    /// Message supplied by the server in the error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref().filter(|m| !m.is_empty()),
            _ => None,
        }
    }
}

/// Why a participant action was not accepted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("action {0} is not permitted right now")]
    NotPermitted(String),
    #[error("an action is already being submitted")]
    AlreadySubmitting,
    #[error("no active session")]
    NoSession,
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: SyncError,
    },
}

impl SubmitError {
    pub(crate) fn failed(source: SyncError) -> Self {
        let message = source
            .server_message()
            .unwrap_or("Failed to submit action")
            .to_string();
        Self::Failed { message, source }
    }

    /// Text suitable for showing to the participant.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Why joining a table failed; carries the user-facing text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("Table ID and Player ID are required.")]
    MissingIdentity,
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: SyncError,
    },
}

impl JoinError {
    pub(crate) fn table_config(source: SyncError) -> Self {
        Self::failed(source, "Failed to load table config.")
    }

    pub(crate) fn join(source: SyncError) -> Self {
        Self::failed(source, "Failed to join game.")
    }

    fn failed(source: SyncError, fallback: &str) -> Self {
        let message = source.server_message().unwrap_or(fallback).to_string();
        Self::Failed { message, source }
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
