//! Observable seat and session stores fed by sparse patches.

mod patch;
pub mod seat;
pub mod session;

pub use seat::{merge_seat, SeatState};
pub use session::{merge_session, SessionState};

use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

const LOG_TARGET: &str = "table_sync::store";

/// The two stores the presentation layer reads.
///
/// Writes are serialized by the underlying `watch` senders; subscribers are only
/// woken when a merge actually changes the record.
pub struct GameStores {
    seat: watch::Sender<SeatState>,
    session: watch::Sender<SessionState>,
}

impl GameStores {
    pub fn new() -> Self {
        let (seat, _) = watch::channel(SeatState::default());
        let (session, _) = watch::channel(SessionState::default());
        Self { seat, session }
    }

    pub fn merge_seat(&self, patch: &Value) -> bool {
        let changed = self.seat.send_if_modified(|current| {
            let next = merge_seat(current, patch);
            if next == *current {
                return false;
            }
            *current = next;
            true
        });
        debug!(target = LOG_TARGET, changed, "merged seat patch");
        changed
    }

    pub fn merge_session(&self, patch: &Value) -> bool {
        let changed = self.session.send_if_modified(|current| {
            let next = merge_session(current, patch);
            if next == *current {
                return false;
            }
            *current = next;
            true
        });
        debug!(target = LOG_TARGET, changed, "merged session patch");
        changed
    }

    /// Restore both records to their initial values.
    pub fn reset(&self) {
        self.seat.send_replace(SeatState::default());
        self.session.send_replace(SessionState::default());
        debug!(target = LOG_TARGET, "stores reset");
    }

    pub fn seat(&self) -> SeatState {
        self.seat.borrow().clone()
    }

    pub fn session(&self) -> SessionState {
        self.session.borrow().clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.borrow().session_id.clone()
    }

    pub fn watch_seat(&self) -> watch::Receiver<SeatState> {
        self.seat.subscribe()
    }

    pub fn watch_session(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }
}

impl Default for GameStores {
    fn default() -> Self {
        Self::new()
    }
}
