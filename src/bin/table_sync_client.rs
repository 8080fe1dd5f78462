use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use table_sync::domain::{ActionKind, Chips};
use table_sync::store::{SeatState, SessionState};
use table_sync::sync::WriterRole;
use table_sync::timer::CountdownView;
use table_sync::{ClientConfig, JoinParams, JoinStatus, TableSession};

const LOG_TARGET: &str = "bin::table_sync_client";

#[derive(Debug, Parser)]
#[command(name = "table_sync_client")]
#[command(about = "Join a poker table and follow its live state", long_about = None)]
struct Args {
    /// Table to join
    #[arg(long, env = "TABLE_ID")]
    table: String,

    /// Participant identity to join as
    #[arg(long, env = "PLAYER_ID")]
    player: String,

    /// Currency code; defaults to play chips
    #[arg(long)]
    currency: Option<String>,

    /// REAL or DEMO; derived from the token when omitted
    #[arg(long)]
    mode: Option<String>,

    /// Join token for real-money tables
    #[arg(long, env = "PLAYER_TOKEN")]
    token: Option<String>,

    /// Override CLIENT_WRITER_ROLE (primary or observer)
    #[arg(long)]
    role: Option<WriterRole>,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "CLIENT_LOG_JSON", default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log store changes until interrupted (default)
    Follow,
    /// Submit one action and leave
    Act {
        /// FOLD, CHECK, CALL, BET, RAISE or ALL_IN
        action: String,
        /// Explicit amount; the allowed action's default otherwise
        #[arg(long)]
        amount: Option<Chips>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    init_tracing(args.json)?;

    let mut config = ClientConfig::from_env().context("failed to load client config")?;
    if let Some(role) = args.role {
        config.writer_role = role;
    }
    let client = config.build_client()?;

    let params = JoinParams {
        table_id: Some(args.table.clone()),
        participant_id: Some(args.player.clone()),
        path_currency: args.currency.clone(),
        path_mode: args.mode.clone(),
        path_token: args.token.clone(),
        ..JoinParams::default()
    };
    let session = client.open(&params)?;
    info!(
        target = LOG_TARGET,
        table_id = %session.request().table_id,
        mode = %session.request().mode,
        currency = %session.request().currency,
        role = %client.role(),
        "joining table"
    );

    match session.join().await.context("failed to join table")? {
        JoinStatus::Joined => {}
        JoinStatus::Discarded => return Err(anyhow!("session closed before the join settled")),
    }

    let outcome = match args.command.unwrap_or(Command::Follow) {
        Command::Follow => follow(&session).await,
        Command::Act { action, amount } => act(&session, ActionKind::from(action), amount).await,
    };

    session.leave().await;
    outcome
}

fn load_dotenv() {
    let manifest_env = env!("CARGO_MANIFEST_DIR");
    let manifest_env_path = PathBuf::from(manifest_env).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

enum Update {
    Seat(SeatState),
    Session(SessionState),
    Countdown(Option<CountdownView>),
}

async fn follow(session: &TableSession) -> Result<()> {
    log_session(&session.stores().session());
    log_seat(&session.stores().seat());

    let seats = WatchStream::from_changes(session.stores().watch_seat()).map(Update::Seat);
    let sessions =
        WatchStream::from_changes(session.stores().watch_session()).map(Update::Session);
    let countdown = WatchStream::from_changes(session.countdown()).map(Update::Countdown);
    let mut updates = seats.merge(sessions).merge(countdown);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("failed to listen for interrupt")?;
                info!(target = LOG_TARGET, "interrupt received, leaving table");
                break;
            }
            update = updates.next() => match update {
                Some(Update::Seat(seat)) => log_seat(&seat),
                Some(Update::Session(state)) => log_session(&state),
                Some(Update::Countdown(Some(view))) => {
                    if view.is_urgent() {
                        warn!(target = LOG_TARGET, remaining = view.remaining, "turn almost over");
                    } else {
                        info!(target = LOG_TARGET, remaining = view.remaining, progress = view.progress, "turn countdown");
                    }
                }
                Some(Update::Countdown(None)) => {}
                None => break,
            },
        }
    }
    Ok(())
}

async fn act(session: &TableSession, kind: ActionKind, amount: Option<Chips>) -> Result<()> {
    if !session.can_act() {
        warn!(target = LOG_TARGET, "it is not this participant's turn");
    }
    session
        .submit(kind.clone(), amount)
        .await
        .map_err(|err| anyhow!(err.user_message()))
        .with_context(|| format!("failed to submit {kind}"))?;
    info!(target = LOG_TARGET, action = %kind, "action submitted");
    Ok(())
}

fn log_session(state: &SessionState) {
    if !state.has_session() {
        return;
    }
    let allowed: Vec<&str> = state
        .allowed_actions
        .iter()
        .map(|entry| entry.action.as_str())
        .collect();
    info!(
        target = LOG_TARGET,
        session_id = state.session_id.as_deref().unwrap_or(""),
        street = state.street_label().unwrap_or("-"),
        pot = state.pot_amount.unwrap_or(0),
        to_call = state.current_bet_to_match.unwrap_or(0),
        actor = state.current_actor_seat_index.unwrap_or(-1),
        board = %state.community_cards.join(" "),
        allowed = %allowed.join(","),
        can_start_hand = state.can_start_hand,
        "session updated"
    );
}

fn log_seat(seat: &SeatState) {
    if !seat.is_occupied() {
        return;
    }
    info!(
        target = LOG_TARGET,
        position = seat.position.unwrap_or(-1),
        chips = seat.chips.unwrap_or(0),
        status = seat.status.as_ref().map(|s| s.as_str()).unwrap_or("-"),
        hole_cards = %seat.hole_cards.join(" "),
        to_act = seat.is_current_actor,
        "seat updated"
    );
}
