pub mod api;
pub mod coalescer;
pub mod config;
pub mod domain;
pub mod error;
pub mod realtime;
pub mod store;
pub mod sync;
pub mod table;
pub mod timer;
pub mod tokio_tools;
pub mod wager;

#[cfg(test)]
pub mod test_utils;

pub use config::ClientConfig;
pub use error::{JoinError, SubmitError, SyncError};
pub use store::{GameStores, SeatState, SessionState};
pub use table::{JoinParams, JoinStatus, TableClient, TableSession};
