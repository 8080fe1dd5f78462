//! Keeps the stores in step with authoritative state.

pub mod watcher;

pub use watcher::{ChangeWatcher, WatchTarget, WatcherPhase};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::Snapshot;
use crate::store::GameStores;

const LOG_TARGET: &str = "table_sync::sync";

/// Whether this client acknowledges (clears) the shared sync flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterRole {
    #[default]
    Primary,
    Observer,
}

impl WriterRole {
    pub fn clears_flag(self) -> bool {
        matches!(self, WriterRole::Primary)
    }
}

impl FromStr for WriterRole {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(WriterRole::Primary),
            "observer" => Ok(WriterRole::Observer),
            other => Err(format!("unknown writer role `{other}`")),
        }
    }
}

impl fmt::Display for WriterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterRole::Primary => f.write_str("primary"),
            WriterRole::Observer => f.write_str("observer"),
        }
    }
}

/// Push a snapshot through both stores. The seat store is only touched when the
/// snapshot contains the participant's seat.
pub fn apply_snapshot(stores: &GameStores, snapshot: &Snapshot, participant: &str) {
    stores.merge_session(snapshot.as_value());
    match snapshot.local_seat(participant) {
        Some(seat) => {
            stores.merge_seat(seat);
        }
        None => debug!(target = LOG_TARGET, participant, "snapshot has no local seat"),
    }
}
