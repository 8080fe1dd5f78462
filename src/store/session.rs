use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ActionKind, AllowedAction, Card, Chips, HandResult, SeatIndex, SessionId};

use super::patch::{
    apply_chips, apply_flag, apply_identity, apply_list, apply_list_with, apply_optional, Patch,
};
use super::seat::SeatState;

/// Shared table view for the current hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: Option<SessionId>,
    pub current_street: Option<String>,
    /// Older engines report the phase under `street`.
    pub street: Option<String>,
    pub status: Option<String>,
    pub pot_amount: Option<Chips>,
    pub current_bet_to_match: Option<Chips>,
    pub dealer_seat_index: Option<SeatIndex>,
    pub small_blind_seat_index: Option<SeatIndex>,
    pub big_blind_seat_index: Option<SeatIndex>,
    pub current_actor_seat_index: Option<SeatIndex>,
    /// Index-addressable; `None` marks an empty seat.
    pub seats: Vec<Option<SeatState>>,
    pub community_cards: Vec<Card>,
    pub can_start_hand: bool,
    pub allowed_actions: Vec<AllowedAction>,
    pub last_hand_win_info: Vec<HandResult>,
    pub turn_started_at: Option<DateTime<Utc>>,
    pub turn_timer_seconds: Option<f64>,
}

impl SessionState {
    /// Apply a sparse patch in place. Non-object patches are ignored.
    pub fn apply(&mut self, patch: &Value) {
        let Some(patch) = patch.as_object() else {
            return;
        };
        apply_identity(&mut self.session_id, patch, "sessionId");
        apply_optional(&mut self.current_street, patch, "currentStreet");
        apply_optional(&mut self.street, patch, "street");
        apply_optional(&mut self.status, patch, "status");
        apply_chips(&mut self.pot_amount, patch, "potAmount");
        apply_chips(&mut self.current_bet_to_match, patch, "currentBetToMatch");
        apply_optional(&mut self.dealer_seat_index, patch, "dealerSeatIndex");
        apply_optional(&mut self.small_blind_seat_index, patch, "smallBlindSeatIndex");
        apply_optional(&mut self.big_blind_seat_index, patch, "bigBlindSeatIndex");
        apply_optional(&mut self.current_actor_seat_index, patch, "currentActorSeatIndex");
        apply_list_with(&mut self.seats, patch, "seats", |entry| {
            Some(SeatState::from_entry(entry))
        });
        apply_list(&mut self.community_cards, patch, "communityCards");
        apply_flag(&mut self.can_start_hand, patch, "canStartHand");
        apply_list(&mut self.allowed_actions, patch, "allowedActions");
        apply_list(&mut self.last_hand_win_info, patch, "lastHandWinInfo");
        apply_turn_started_at(&mut self.turn_started_at, patch);
        apply_optional(&mut self.turn_timer_seconds, patch, "turnTimerSeconds");
    }

    pub fn has_session(&self) -> bool {
        self.session_id.is_some()
    }

    pub fn street_label(&self) -> Option<&str> {
        self.current_street.as_deref().or(self.street.as_deref())
    }

    pub fn allowed(&self, kind: &ActionKind) -> Option<&AllowedAction> {
        self.allowed_actions.iter().find(|entry| &entry.action == kind)
    }
}

/// Accepts RFC 3339 strings or epoch milliseconds.
fn apply_turn_started_at(slot: &mut Option<DateTime<Utc>>, patch: &Patch) {
    match patch.get("turnStartedAt") {
        None => {}
        Some(Value::Null) => *slot = None,
        Some(Value::String(raw)) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                *slot = Some(parsed.with_timezone(&Utc));
            }
        }
        Some(Value::Number(millis)) => {
            if let Some(parsed) = millis
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            {
                *slot = Some(parsed);
            }
        }
        Some(_) => {}
    }
}

/// Pure merge: `current` with `patch` applied.
pub fn merge_session(current: &SessionState, patch: &Value) -> SessionState {
    let mut next = current.clone();
    next.apply(patch);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn live_session() -> SessionState {
        merge_session(
            &SessionState::default(),
            &json!({
                "sessionId": "S1",
                "currentStreet": "FLOP",
                "potAmount": 60,
                "dealerSeatIndex": 0,
                "smallBlindSeatIndex": 1,
                "bigBlindSeatIndex": 2,
                "seats": [
                    { "playerId": "P0", "chips": 500 },
                    null,
                    { "playerId": "P1", "chips": 480, "isCurrentActor": true }
                ],
                "communityCards": ["2H", "7D", "9C"],
                "canStartHand": false,
                "allowedActions": [
                    { "action": "FOLD" },
                    { "action": "CALL", "callAmount": 20 },
                    { "action": "RAISE", "minRaiseAmount": 40, "maxRaiseAmount": 480 }
                ],
                "turnStartedAt": "2026-02-12T09:05:13.078Z",
                "turnTimerSeconds": 47
            }),
        )
    }

    #[test]
    fn pot_patch_leaves_seats_untouched() {
        let session = live_session();
        let next = merge_session(&session, &json!({ "potAmount": 150 }));
        assert_eq!(next.pot_amount, Some(150));
        assert_eq!(next.seats, session.seats);
        assert_eq!(next.community_cards, session.community_cards);
        assert_eq!(next.allowed_actions, session.allowed_actions);
    }

    #[test]
    fn presence_only_overwrite_and_idempotence() {
        let session = live_session();
        let patch = json!({
            "currentStreet": "TURN",
            "communityCards": ["2H", "7D", "9C", "KS"],
            "canStartHand": 1,
            "bogus": true
        });
        let once = merge_session(&session, &patch);
        assert_eq!(merge_session(&once, &patch), once);

        assert_eq!(once.current_street.as_deref(), Some("TURN"));
        assert!(once.can_start_hand);
        assert_eq!(once.session_id, session.session_id);
        assert_eq!(once.pot_amount, session.pot_amount);
        assert_eq!(once.turn_started_at, session.turn_started_at);
    }

    #[test]
    fn empty_patch_is_noop() {
        let session = live_session();
        assert_eq!(merge_session(&session, &json!({})), session);
        assert_eq!(merge_session(&session, &Value::Null), session);
    }

    #[test]
    fn arrays_replace_rather_than_append() {
        let session = live_session();
        let next = merge_session(&session, &json!({ "seats": [null, { "playerId": "P9" }] }));
        assert_eq!(next.seats.len(), 2);
        assert!(next.seats[0].is_none());
        assert_eq!(
            next.seats[1].as_ref().and_then(|s| s.player_id.as_deref()),
            Some("P9")
        );

        let cleared = merge_session(&session, &json!({ "allowedActions": { "action": "FOLD" } }));
        assert!(cleared.allowed_actions.is_empty());
    }

    #[test]
    fn lookups_read_merged_state() {
        let session = live_session();
        let raise = session.allowed(&ActionKind::Raise).unwrap();
        assert_eq!(raise.wager_bounds(), (40, 480));
        assert_eq!(session.street_label(), Some("FLOP"));
    }

    #[test]
    fn fractional_amounts_keep_every_allowed_action() {
        let next = merge_session(
            &live_session(),
            &json!({
                "potAmount": 12.5,
                "currentBetToMatch": 0.5,
                "allowedActions": [
                    { "action": "FOLD" },
                    { "action": "CALL", "callAmount": 0.5 },
                    { "action": "RAISE", "minRaiseAmount": 1.0, "maxRaiseAmount": 99.5 },
                    { "action": "BET", "minRaiseAmount": "lots", "maxRaiseAmount": 80 }
                ]
            }),
        );

        assert_eq!(next.pot_amount, Some(13));
        assert_eq!(next.current_bet_to_match, Some(1));
        assert_eq!(next.allowed_actions.len(), 4);
        assert_eq!(next.allowed(&ActionKind::Call).unwrap().call_amount, Some(1));
        assert_eq!(
            next.allowed(&ActionKind::Raise).unwrap().wager_bounds(),
            (1, 100)
        );
        let bet = next.allowed(&ActionKind::Bet).unwrap();
        assert_eq!(bet.min_raise_amount, None);
        assert_eq!(bet.max_raise_amount, Some(80));
    }

    #[test]
    fn turn_start_accepts_epoch_millis() {
        let next = merge_session(&SessionState::default(), &json!({ "turnStartedAt": 1_000 }));
        assert_eq!(next.turn_started_at.map(|t| t.timestamp_millis()), Some(1_000));
    }
}
