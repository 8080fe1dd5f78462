#![cfg(test)]

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;

use super::*;
use crate::domain::GameMode;
use crate::realtime::InMemoryChangeChannel;
use crate::store::{SeatState, SessionState};
use crate::test_utils::{rejected, settle, FakeTableApi};
use crate::timer::ManualClock;

struct Fixture {
    api: Arc<FakeTableApi>,
    channel: Arc<InMemoryChangeChannel>,
    clock: Arc<ManualClock>,
    client: TableClient,
}

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn fixture() -> Fixture {
    let api = Arc::new(FakeTableApi::new());
    api.set_join(json!({
        "data": {
            "sessionId": "S1",
            "currentStreet": "PRE_FLOP",
            "potAmount": 15,
            "seats": [
                { "playerId": "P2", "chips": 995 },
                { "playerId": "P1", "chips": 990, "isCurrentActor": true, "status": "ACTIVE" }
            ],
            "allowedActions": [
                { "action": "FOLD" },
                { "action": "CALL", "callAmount": 10 },
                { "action": "RAISE", "minRaiseAmount": 20, "maxRaiseAmount": 990 }
            ],
            "turnStartedAt": "2025-03-01T12:00:00Z",
            "turnTimerSeconds": 30
        }
    }));
    let channel = Arc::new(InMemoryChangeChannel::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let client = TableClient::new(api.clone(), channel.clone()).with_clock(clock.clone());
    Fixture {
        api,
        channel,
        clock,
        client,
    }
}

fn params() -> JoinParams {
    JoinParams::new("T1", "P1")
}

#[tokio::test]
async fn concurrent_identical_joins_share_one_request() {
    let f = fixture();
    let first = f.client.open(&params()).unwrap();
    let second = f.client.open(&params()).unwrap();

    f.api.hold();
    let (a, b, _) = tokio::join!(first.join(), second.join(), async {
        settle().await;
        assert_eq!(f.client.pending_joins(), 1);
        f.api.release();
    });

    assert_eq!(a, Ok(JoinStatus::Joined));
    assert_eq!(b, Ok(JoinStatus::Joined));
    assert_eq!(f.api.table_calls(), 1);
    assert_eq!(f.api.join_calls(), 1);
    assert_eq!(f.client.pending_joins(), 0);
    assert_eq!(first.stores().session(), second.stores().session());
}

#[tokio::test]
async fn joins_for_different_participants_are_not_shared() {
    let f = fixture();
    let first = f.client.open(&params()).unwrap();
    let second = f.client.open(&JoinParams::new("T1", "P2")).unwrap();

    let (a, b) = tokio::join!(first.join(), second.join());
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(f.api.join_calls(), 2);

    let participants: Vec<_> = f.api.joins().into_iter().map(|j| j.participant_id).collect();
    assert!(participants.contains(&"P1".to_string()));
    assert!(participants.contains(&"P2".to_string()));
}

#[tokio::test]
async fn join_merges_snapshot_and_follows_the_session() {
    let f = fixture();
    let session = f.client.open(&params()).unwrap();
    assert_eq!(session.join().await, Ok(JoinStatus::Joined));
    settle().await;

    let joined = f.api.joins();
    assert_eq!(joined[0].mode, GameMode::Demo);
    assert_eq!(joined[0].token, None);
    assert_eq!(session.table_config().unwrap().seat_count, Some(6));

    let state = session.stores().session();
    assert_eq!(state.session_id.as_deref(), Some("S1"));
    assert_eq!(state.seats.len(), 2);
    assert_eq!(session.stores().seat().chips, Some(990));
    assert_eq!(f.channel.subscriber_count("S1"), 1);

    f.api.set_state(json!({ "potAmount": 150 }));
    f.channel.request_sync("S1");
    settle().await;

    let state = session.stores().session();
    assert_eq!(state.pot_amount, Some(150));
    assert_eq!(state.seats.len(), 2, "seats untouched by a pot-only snapshot");
    let query = &f.api.queries()[0];
    assert_eq!(query.session_id.as_deref(), Some("S1"));
    assert_eq!(query.currency.as_deref(), Some("PC"));
    assert_eq!(query.mode, Some(GameMode::Demo));
}

#[tokio::test]
async fn session_id_change_moves_the_subscription() {
    let f = fixture();
    let session = f.client.open(&params()).unwrap();
    session.join().await.unwrap();
    settle().await;
    assert_eq!(f.channel.subscriber_count("S1"), 1);

    session.stores().merge_session(&json!({ "sessionId": "S2" }));
    settle().await;
    assert_eq!(f.channel.subscriber_count("S1"), 0);
    assert_eq!(f.channel.subscriber_count("S2"), 1);
}

#[tokio::test]
async fn countdown_follows_the_turn_deadline() {
    let f = fixture();
    f.clock.advance(ChronoDuration::seconds(4));
    let session = f.client.open(&params()).unwrap();
    let countdown = session.countdown();
    assert_eq!(*countdown.borrow(), None);

    session.join().await.unwrap();
    settle().await;
    assert_eq!(countdown.borrow().unwrap().remaining, 26);

    session.stores().merge_session(&json!({
        "turnStartedAt": "2025-03-01T12:00:04Z",
        "turnTimerSeconds": 15
    }));
    settle().await;
    assert_eq!(countdown.borrow().unwrap().remaining, 15);

    session.stores().merge_session(&json!({ "turnStartedAt": null }));
    settle().await;
    assert_eq!(*countdown.borrow(), None);
}

#[tokio::test]
async fn leave_tears_everything_down() {
    let f = fixture();
    let session = f.client.open(&params()).unwrap();
    session.join().await.unwrap();
    settle().await;
    assert!(session.countdown().borrow().is_some());

    session.leave().await;
    settle().await;

    assert!(session.has_left());
    assert_eq!(session.stores().session(), SessionState::default());
    assert_eq!(session.stores().seat(), SeatState::default());
    assert_eq!(*session.countdown().borrow(), None);
    assert_eq!(f.channel.subscriber_count("S1"), 0);

    f.channel.request_sync("S1");
    settle().await;
    assert_eq!(f.api.state_calls(), 0);
}

#[tokio::test]
async fn join_settling_after_leave_is_discarded() {
    let f = fixture();
    let session = f.client.open(&params()).unwrap();

    f.api.hold();
    let (status, _) = tokio::join!(session.join(), async {
        settle().await;
        session.leave().await;
        f.api.release();
    });

    assert_eq!(status, Ok(JoinStatus::Discarded));
    settle().await;
    assert_eq!(session.stores().session(), SessionState::default());
    assert_eq!(session.table_config(), None);
    assert_eq!(f.channel.subscriber_count("S1"), 0);
    assert_eq!(session.join().await, Ok(JoinStatus::Discarded));
}

#[tokio::test]
async fn join_failures_carry_user_messages() {
    let f = fixture();
    let session = f.client.open(&params()).unwrap();

    f.api.fail_table_with(Some(SyncError::transport("connection refused")));
    let err = session.join().await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to load table config.");
    assert_eq!(f.api.join_calls(), 0);

    f.api.fail_table_with(None);
    f.api.fail_join_with(Some(rejected(409, "Seat already taken")));
    let err = session.join().await.unwrap_err();
    assert_eq!(err.user_message(), "Seat already taken");

    f.api.fail_join_with(Some(SyncError::transport("reset")));
    let err = session.join().await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to join game.");

    f.api.fail_join_with(None);
    assert_eq!(session.join().await, Ok(JoinStatus::Joined));
}

#[test]
fn missing_identity_is_rejected_before_any_request() {
    let f = fixture();
    let err = f
        .client
        .open(&JoinParams::default())
        .err()
        .unwrap();
    assert_eq!(err.user_message(), "Table ID and Player ID are required.");
    assert_eq!(f.api.table_calls(), 0);
}

#[tokio::test]
async fn submit_resolves_default_amounts() {
    let f = fixture();
    let session = f.client.open(&params()).unwrap();
    session.join().await.unwrap();
    assert!(session.can_act());

    session.submit(ActionKind::Call, None).await.unwrap();
    session.submit(ActionKind::Raise, None).await.unwrap();

    let mut selector = session.wager(&ActionKind::Raise).unwrap();
    selector.drag(500.0);
    session.submit_wager(&selector).await.unwrap();

    let sent = f.api.submissions();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].amount, 10);
    assert_eq!(sent[1].amount, 20);
    assert_eq!(sent[2].action, ActionKind::Raise);
    assert_eq!(sent[2].amount, selector.amount());
    assert_eq!(sent[0].session_id, "S1");
    assert_eq!(sent[0].player_id, "P1");
    assert_eq!(sent[0].table_id, "T1");
}

#[tokio::test]
async fn submit_is_gated() {
    let f = fixture();
    let session = f.client.open(&params()).unwrap();
    assert_eq!(
        session.submit(ActionKind::Fold, None).await,
        Err(SubmitError::NoSession)
    );

    session.join().await.unwrap();
    assert_eq!(
        session.submit(ActionKind::Check, None).await,
        Err(SubmitError::NotPermitted("CHECK".into()))
    );

    session.stores().merge_seat(&json!({ "status": "FOLDED" }));
    assert!(!session.can_act());
    assert_eq!(
        session.submit(ActionKind::Fold, None).await,
        Err(SubmitError::NotPermitted("FOLD".into()))
    );
    assert!(f.api.submissions().is_empty());
}

#[tokio::test]
async fn second_submit_while_pending_is_rejected() {
    let f = fixture();
    let session = f.client.open(&params()).unwrap();
    session.join().await.unwrap();

    f.api.hold();
    let (first, second) = tokio::join!(session.submit(ActionKind::Call, None), async {
        settle().await;
        assert!(session.is_submitting());
        let second = session.submit(ActionKind::Fold, None).await;
        f.api.release();
        second
    });

    assert_eq!(first, Ok(()));
    assert_eq!(second, Err(SubmitError::AlreadySubmitting));
    assert!(!session.is_submitting());
    assert_eq!(f.api.submissions().len(), 1);
}

#[tokio::test]
async fn submit_failure_surfaces_server_message() {
    let f = fixture();
    let session = f.client.open(&params()).unwrap();
    session.join().await.unwrap();

    f.api.fail_submit_with(Some(rejected(400, "Not your turn")));
    let err = session.submit(ActionKind::Call, None).await.unwrap_err();
    assert_eq!(err.user_message(), "Not your turn");

    f.api.fail_submit_with(Some(SyncError::transport("reset")));
    let err = session.submit(ActionKind::Call, None).await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to submit action");
    assert!(!session.is_submitting());
}
