use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{Snapshot, StateQuery, TableApi};
use crate::coalescer::{RequestCoalescer, Ticket};
use crate::domain::{GameMode, ParticipantId, SessionId, TableId};
use crate::error::SyncError;
use crate::realtime::{ChangeChannel, FlagSubscription, SyncFlag};
use crate::store::GameStores;
use crate::tokio_tools::{spawn_named_task, TaskGuard};

use super::{apply_snapshot, WriterRole};

const LOG_TARGET: &str = "table_sync::sync::watcher";

pub type StateFetches = RequestCoalescer<StateQuery, Option<Snapshot>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherPhase {
    Idle,
    Subscribed,
    SyncInFlight,
}

/// Identifiers a watcher needs before it may subscribe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchTarget {
    pub session_id: Option<SessionId>,
    pub table_id: Option<TableId>,
    pub participant_id: Option<ParticipantId>,
    pub currency: Option<String>,
    pub mode: Option<GameMode>,
}

impl WatchTarget {
    fn resolve(&self) -> Result<(SessionId, StateQuery), SyncError> {
        let session_id = present(&self.session_id).ok_or(SyncError::MissingParameter("sessionId"))?;
        let table_id = present(&self.table_id).ok_or(SyncError::MissingParameter("tableId"))?;
        let participant_id =
            present(&self.participant_id).ok_or(SyncError::MissingParameter("playerId"))?;

        let query = StateQuery {
            table_id,
            participant_id,
            session_id: Some(session_id.clone()),
            currency: self.currency.clone(),
            mode: self.mode,
        };
        Ok((session_id, query))
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Follows one session's sync flag and pulls fresh state when it is raised.
///
/// Each call to [`ChangeWatcher::start`] opens a new subscription with its own phase
/// and cancellation token, so work left over from a previous subscription can never
/// write into the stores or flip the new subscription's phase.
pub struct ChangeWatcher {
    api: Arc<dyn TableApi>,
    channel: Arc<dyn ChangeChannel>,
    stores: Arc<GameStores>,
    fetches: Arc<StateFetches>,
    role: WriterRole,
    active: Option<ActiveWatch>,
}

struct ActiveWatch {
    link: Arc<WatchLink>,
    _task: TaskGuard<()>,
}

impl ChangeWatcher {
    pub fn new(
        api: Arc<dyn TableApi>,
        channel: Arc<dyn ChangeChannel>,
        stores: Arc<GameStores>,
        role: WriterRole,
    ) -> Self {
        Self {
            api,
            channel,
            stores,
            fetches: Arc::new(StateFetches::new()),
            role,
            active: None,
        }
    }

    /// Share a fetch registry with other watchers of the same stores.
    pub fn with_fetches(mut self, fetches: Arc<StateFetches>) -> Self {
        self.fetches = fetches;
        self
    }

    pub fn role(&self) -> WriterRole {
        self.role
    }

    pub fn phase(&self) -> WatcherPhase {
        self.active
            .as_ref()
            .map(|active| *active.link.phase.lock())
            .unwrap_or(WatcherPhase::Idle)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.link.session_id.as_str())
    }

    /// Subscribe for `target`, replacing any current subscription.
    ///
    /// Fails with [`SyncError::MissingParameter`] and stays idle when the session,
    /// table or participant id is absent or empty.
    pub async fn start(&mut self, target: &WatchTarget) -> Result<(), SyncError> {
        self.stop();

        let (session_id, query) = target.resolve()?;
        let subscription = self.channel.subscribe(&session_id).await?;

        let link = Arc::new(WatchLink {
            session_id,
            query,
            role: self.role,
            api: Arc::clone(&self.api),
            channel: Arc::clone(&self.channel),
            stores: Arc::clone(&self.stores),
            fetches: Arc::clone(&self.fetches),
            phase: Mutex::new(WatcherPhase::Subscribed),
            stop: CancellationToken::new(),
        });
        info!(
            target = LOG_TARGET,
            session_id = %link.session_id,
            role = %self.role,
            "subscribed to sync flag"
        );

        let task = spawn_named_task("sync-flag-watch", Arc::clone(&link).follow(subscription));
        self.active = Some(ActiveWatch {
            link,
            _task: TaskGuard::new(task),
        });
        Ok(())
    }

    /// Unsubscribe and abandon any in-flight fetch; its result will not be merged.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        *active.link.phase.lock() = WatcherPhase::Idle;
        active.link.stop.cancel();
        info!(
            target = LOG_TARGET,
            session_id = %active.link.session_id,
            "sync flag watch torn down"
        );
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State shared between one subscription's follow loop and its sync tasks.
struct WatchLink {
    session_id: SessionId,
    query: StateQuery,
    role: WriterRole,
    api: Arc<dyn TableApi>,
    channel: Arc<dyn ChangeChannel>,
    stores: Arc<GameStores>,
    fetches: Arc<StateFetches>,
    phase: Mutex<WatcherPhase>,
    stop: CancellationToken,
}

impl WatchLink {
    async fn follow(self: Arc<Self>, mut subscription: FlagSubscription) {
        let initial = tokio::select! {
            _ = self.stop.cancelled() => return,
            read = self.channel.read(&self.session_id) => read,
        };
        match initial {
            Ok(flag) => self.on_flag(flag),
            Err(err) => {
                debug!(target = LOG_TARGET, error = %err, "initial sync flag read failed");
            }
        }

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                next = subscription.next() => match next {
                    Some(flag) => self.on_flag(flag),
                    None => {
                        warn!(
                            target = LOG_TARGET,
                            session_id = %self.session_id,
                            "sync flag subscription closed"
                        );
                        break;
                    }
                },
            }
        }
    }

    fn on_flag(self: &Arc<Self>, flag: SyncFlag) {
        if !flag.should_sync || !self.begin_sync() {
            return;
        }
        // Fetches already running may predate this notification.
        let ticket = self.fetches.ticket();

        if self.role.clears_flag() {
            let channel = Arc::clone(&self.channel);
            let session_id = self.session_id.clone();
            spawn_named_task("clear-sync-flag", async move {
                if let Err(err) = channel.clear(&session_id).await {
                    warn!(target = LOG_TARGET, %session_id, error = %err, "failed to clear sync flag");
                }
            });
        }

        spawn_named_task("state-sync", Arc::clone(self).sync(ticket));
    }

    /// `Subscribed -> SyncInFlight`; false when another sync already holds the slot.
    fn begin_sync(&self) -> bool {
        let mut phase = self.phase.lock();
        match *phase {
            WatcherPhase::Subscribed => {
                *phase = WatcherPhase::SyncInFlight;
                true
            }
            WatcherPhase::SyncInFlight => {
                debug!(target = LOG_TARGET, "sync already in flight, notification ignored");
                false
            }
            WatcherPhase::Idle => false,
        }
    }

    async fn sync(self: Arc<Self>, since: Ticket) {
        let api = Arc::clone(&self.api);
        let query = self.query.clone();
        let fetch = self.fetches.run_since(self.query.clone(), since, move || async move {
            api.fetch_state(&query).await.map(Snapshot::from_body)
        });

        let outcome = tokio::select! {
            _ = self.stop.cancelled() => {
                debug!(target = LOG_TARGET, "in-flight sync abandoned");
                return;
            }
            outcome = fetch => outcome,
        };
        self.settle(outcome);
    }

    /// Merge the fetched state and return to `Subscribed`, unless the watch was torn
    /// down while the fetch was pending.
    fn settle(&self, outcome: Result<Option<Snapshot>, SyncError>) {
        let mut phase = self.phase.lock();
        if *phase != WatcherPhase::SyncInFlight {
            debug!(target = LOG_TARGET, "discarding state fetched after teardown");
            return;
        }

        match outcome {
            Ok(Some(snapshot)) => {
                apply_snapshot(&self.stores, &snapshot, &self.query.participant_id);
                debug!(target = LOG_TARGET, session_id = %self.session_id, "state synced");
            }
            Ok(None) => {
                debug!(target = LOG_TARGET, "state endpoint returned an empty body");
            }
            Err(err) => {
                warn!(target = LOG_TARGET, session_id = %self.session_id, error = %err, "failed to fetch game state");
            }
        }
        *phase = WatcherPhase::Subscribed;
    }
}
