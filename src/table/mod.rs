//! One participant's seat at one table: join, follow, act, leave.

pub mod actions;
pub mod params;

#[cfg(test)]
mod tests;

pub use actions::{can_act, default_amount, SubmitLatch};
pub use params::JoinParams;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ActionSubmission, JoinRequest, Snapshot, TableApi};
use crate::coalescer::RequestCoalescer;
use crate::domain::{ActionKind, Chips, TableConfig};
use crate::error::{JoinError, SubmitError, SyncError};
use crate::realtime::ChangeChannel;
use crate::store::GameStores;
use crate::sync::watcher::StateFetches;
use crate::sync::{apply_snapshot, ChangeWatcher, WatchTarget, WriterRole};
use crate::timer::{Clock, CountdownTicker, CountdownView, SystemClock};
use crate::tokio_tools::{spawn_named_task, TaskGuard};
use crate::wager::WagerSelector;

const LOG_TARGET: &str = "table_sync::table";

/// Table configuration and initial snapshot returned by a join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub table: TableConfig,
    pub snapshot: Option<Snapshot>,
}

pub type JoinRegistry = RequestCoalescer<JoinRequest, Result<JoinOutcome, JoinError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStatus {
    Joined,
    /// The session was left before the join settled; nothing was applied.
    Discarded,
}

/// Dependencies shared by every table session this client opens.
///
/// Sessions opened from the same client share one join registry, so identical
/// concurrent joins hit the server once.
#[derive(Clone)]
pub struct TableClient {
    api: Arc<dyn TableApi>,
    channel: Arc<dyn ChangeChannel>,
    clock: Arc<dyn Clock>,
    role: WriterRole,
    joins: Arc<JoinRegistry>,
    fetches: Arc<StateFetches>,
}

impl TableClient {
    pub fn new(api: Arc<dyn TableApi>, channel: Arc<dyn ChangeChannel>) -> Self {
        Self {
            api,
            channel,
            clock: Arc::new(SystemClock),
            role: WriterRole::default(),
            joins: Arc::new(JoinRegistry::new()),
            fetches: Arc::new(StateFetches::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_role(mut self, role: WriterRole) -> Self {
        self.role = role;
        self
    }

    pub fn role(&self) -> WriterRole {
        self.role
    }

    pub fn pending_joins(&self) -> usize {
        self.joins.in_flight()
    }

    /// Resolve `params` and open a session with fresh stores. Nothing is sent yet.
    pub fn open(&self, params: &JoinParams) -> Result<TableSession, JoinError> {
        let request = params.resolve()?;
        Ok(TableSession::new(self.clone(), request))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Fresh,
    Joining,
    Joined,
    Left,
}

pub struct TableSession {
    id: Uuid,
    client: TableClient,
    request: JoinRequest,
    stores: Arc<GameStores>,
    lifecycle: Mutex<Lifecycle>,
    table: Mutex<Option<TableConfig>>,
    stop: CancellationToken,
    supervisor: Mutex<Option<TaskGuard<()>>>,
    ticker: Mutex<Option<CountdownTicker>>,
    countdown: watch::Receiver<Option<CountdownView>>,
    latch: SubmitLatch,
}

impl TableSession {
    fn new(client: TableClient, request: JoinRequest) -> Self {
        let ticker = CountdownTicker::new(Arc::clone(&client.clock));
        let countdown = ticker.subscribe();
        Self {
            id: Uuid::new_v4(),
            client,
            request,
            stores: Arc::new(GameStores::new()),
            lifecycle: Mutex::new(Lifecycle::Fresh),
            table: Mutex::new(None),
            stop: CancellationToken::new(),
            supervisor: Mutex::new(None),
            ticker: Mutex::new(Some(ticker)),
            countdown,
            latch: SubmitLatch::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &JoinRequest {
        &self.request
    }

    pub fn stores(&self) -> &Arc<GameStores> {
        &self.stores
    }

    pub fn table_config(&self) -> Option<TableConfig> {
        self.table.lock().clone()
    }

    pub fn countdown(&self) -> watch::Receiver<Option<CountdownView>> {
        self.countdown.clone()
    }

    pub fn has_left(&self) -> bool {
        *self.lifecycle.lock() == Lifecycle::Left
    }

    /// Load the table configuration and join, sharing the work with any identical
    /// join already in flight. On success the snapshot is merged and the session
    /// starts following the sync flag and the turn countdown.
    pub async fn join(&self) -> Result<JoinStatus, JoinError> {
        {
            let mut state = self.lifecycle.lock();
            match *state {
                Lifecycle::Left => return Ok(JoinStatus::Discarded),
                Lifecycle::Fresh => *state = Lifecycle::Joining,
                Lifecycle::Joining | Lifecycle::Joined => {}
            }
        }

        let api = Arc::clone(&self.client.api);
        let request = self.request.clone();
        let outcome = self
            .client
            .joins
            .run(self.request.clone(), move || async move {
                Ok(perform_join(api, request).await)
            })
            .await
            .unwrap_or_else(|err| Err(JoinError::join(err)));

        self.settle_join(outcome)
    }

    fn settle_join(&self, outcome: Result<JoinOutcome, JoinError>) -> Result<JoinStatus, JoinError> {
        let mut state = self.lifecycle.lock();
        if *state == Lifecycle::Left {
            debug!(target = LOG_TARGET, session = %self.id, "join settled after leave, discarding");
            return Ok(JoinStatus::Discarded);
        }

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                if *state == Lifecycle::Joining {
                    *state = Lifecycle::Fresh;
                }
                warn!(target = LOG_TARGET, session = %self.id, error = %err, "join failed");
                return Err(err);
            }
        };

        *self.table.lock() = Some(outcome.table);
        if let Some(snapshot) = &outcome.snapshot {
            apply_snapshot(&self.stores, snapshot, &self.request.participant_id);
        }
        *state = Lifecycle::Joined;
        self.start_supervisor();

        let session_id = self.stores.session_id().unwrap_or_default();
        info!(
            target = LOG_TARGET,
            session = %self.id,
            table_id = %self.request.table_id,
            participant_id = %self.request.participant_id,
            mode = %self.request.mode,
            %session_id,
            "joined table"
        );
        Ok(JoinStatus::Joined)
    }

    fn start_supervisor(&self) {
        let Some(ticker) = self.ticker.lock().take() else {
            return;
        };
        let watcher = ChangeWatcher::new(
            Arc::clone(&self.client.api),
            Arc::clone(&self.client.channel),
            Arc::clone(&self.stores),
            self.client.role,
        )
        .with_fetches(Arc::clone(&self.client.fetches));
        let base = WatchTarget {
            session_id: None,
            table_id: Some(self.request.table_id.clone()),
            participant_id: Some(self.request.participant_id.clone()),
            currency: Some(self.request.currency.clone()),
            mode: Some(self.request.mode),
        };

        let task = spawn_named_task(
            "table-session",
            supervise(
                watcher,
                ticker,
                Arc::clone(&self.stores),
                base,
                self.stop.clone(),
            ),
        );
        *self.supervisor.lock() = Some(TaskGuard::new(task));
    }

    /// Whether the local participant may act right now.
    pub fn can_act(&self) -> bool {
        can_act(&self.stores.seat(), &self.stores.session())
    }

    pub fn is_submitting(&self) -> bool {
        self.latch.is_busy()
    }

    /// Open the wager slider for a BET or RAISE the participant is allowed to make.
    pub fn wager(&self, kind: &ActionKind) -> Option<WagerSelector> {
        WagerSelector::open_for(kind, &self.stores.session().allowed_actions)
    }

    /// Submit an action. Without an explicit amount the allowed entry's default is
    /// used. Nothing is applied locally; the result arrives through the next sync.
    pub async fn submit(&self, kind: ActionKind, amount: Option<Chips>) -> Result<(), SubmitError> {
        let session = self.stores.session();
        let seat = self.stores.seat();
        actions::ensure_permitted(&kind, &seat, &session)?;
        let session_id = session.session_id.clone().ok_or(SubmitError::NoSession)?;

        let _permit = self.latch.try_acquire()?;
        let amount = amount.unwrap_or_else(|| default_amount(&kind, &session.allowed_actions));
        let submission = ActionSubmission {
            action: kind,
            amount,
            session_id,
            player_id: self.request.participant_id.clone(),
            table_id: self.request.table_id.clone(),
        };
        info!(
            target = LOG_TARGET,
            session = %self.id,
            action = %submission.action,
            amount,
            "submitting action"
        );

        self.client
            .api
            .submit_action(&submission)
            .await
            .map_err(|err| {
                warn!(target = LOG_TARGET, session = %self.id, error = %err, "action rejected");
                SubmitError::failed(err)
            })
    }

    pub async fn submit_wager(&self, selector: &WagerSelector) -> Result<(), SubmitError> {
        self.submit(selector.kind().clone(), Some(selector.amount()))
            .await
    }

    /// Stop following the table and reset both stores. A join still in flight is
    /// discarded when it settles.
    pub async fn leave(&self) {
        {
            let mut state = self.lifecycle.lock();
            if *state == Lifecycle::Left {
                return;
            }
            *state = Lifecycle::Left;
            self.stop.cancel();
        }

        let supervisor = self.supervisor.lock().take();
        if let Some(task) = supervisor {
            task.wait().await;
        }
        let idle_ticker = self.ticker.lock().take();
        if let Some(mut ticker) = idle_ticker {
            ticker.stop();
        }
        self.stores.reset();
        info!(target = LOG_TARGET, session = %self.id, "left table");
    }
}

impl Drop for TableSession {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn perform_join(
    api: Arc<dyn TableApi>,
    request: JoinRequest,
) -> Result<JoinOutcome, JoinError> {
    let table = api
        .fetch_table(&request.table_id)
        .await
        .map_err(JoinError::table_config)?;
    let body = api.join_table(&request).await.map_err(JoinError::join)?;
    Ok(JoinOutcome {
        table,
        snapshot: Snapshot::from_body(body),
    })
}

/// Follows the session store: restarts the watcher when the session id changes and
/// retargets the countdown when the turn deadline changes.
async fn supervise(
    mut watcher: ChangeWatcher,
    mut ticker: CountdownTicker,
    stores: Arc<GameStores>,
    base: WatchTarget,
    stop: CancellationToken,
) {
    let mut session_rx = stores.watch_session();
    let mut watched = None;
    let mut deadline = None;

    loop {
        let (session_id, turn) = {
            let session = session_rx.borrow_and_update();
            (
                session.session_id.clone(),
                (session.turn_started_at, session.turn_timer_seconds),
            )
        };

        if watched.as_ref() != Some(&session_id) {
            let target = WatchTarget {
                session_id: session_id.clone(),
                ..base.clone()
            };
            match watcher.start(&target).await {
                Ok(()) => {}
                Err(SyncError::MissingParameter(name)) => {
                    debug!(target = LOG_TARGET, missing = name, "sync watch not started");
                }
                Err(err) => {
                    warn!(target = LOG_TARGET, error = %err, "failed to subscribe to sync flag");
                }
            }
            watched = Some(session_id);
        }

        if deadline != Some(turn) {
            ticker.retarget(turn.0, turn.1);
            deadline = Some(turn);
        }

        tokio::select! {
            _ = stop.cancelled() => break,
            changed = session_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    watcher.stop();
    ticker.stop();
}
