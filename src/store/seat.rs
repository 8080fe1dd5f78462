use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Card, Chips, ParticipantId, SeatIndex, SeatStatus};

use super::patch::{apply_chips, apply_flag, apply_identity, apply_list, apply_optional};

/// The local participant's seat, or one entry of the table's seat list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatState {
    pub position: Option<SeatIndex>,
    pub player_id: Option<ParticipantId>,
    pub player_name: Option<String>,
    pub player_avatar: Option<String>,
    pub chips: Option<Chips>,
    pub status: Option<SeatStatus>,
    pub hole_cards: Vec<Card>,
    pub is_current_actor: bool,
}

impl SeatState {
    /// Apply a sparse patch in place. Non-object patches are ignored.
    pub fn apply(&mut self, patch: &Value) {
        let Some(patch) = patch.as_object() else {
            return;
        };
        apply_optional(&mut self.position, patch, "position");
        apply_identity(&mut self.player_id, patch, "playerId");
        apply_optional(&mut self.player_name, patch, "playerName");
        apply_optional(&mut self.player_avatar, patch, "playerAvatar");
        apply_chips(&mut self.chips, patch, "chips");
        apply_optional(&mut self.status, patch, "status");
        apply_list(&mut self.hole_cards, patch, "holeCards");
        apply_flag(&mut self.is_current_actor, patch, "isCurrentActor");
    }

    /// Decode a seat-list entry: `null` and non-objects are empty seats.
    pub fn from_entry(entry: &Value) -> Option<Self> {
        if !entry.is_object() {
            return None;
        }
        let mut seat = Self::default();
        seat.apply(entry);
        Some(seat)
    }

    pub fn is_occupied(&self) -> bool {
        self.player_id.is_some()
    }

    /// Whether this seat may submit an action right now.
    pub fn can_act(&self) -> bool {
        self.is_current_actor
            && !self
                .status
                .as_ref()
                .map(SeatStatus::blocks_action)
                .unwrap_or(false)
    }
}

/// Pure merge: `current` with `patch` applied.
pub fn merge_seat(current: &SeatState, patch: &Value) -> SeatState {
    let mut next = current.clone();
    next.apply(patch);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seated() -> SeatState {
        merge_seat(
            &SeatState::default(),
            &json!({
                "position": 2,
                "playerId": "P1",
                "playerName": "ada",
                "chips": 900,
                "status": "ACTIVE",
                "holeCards": ["14H", "13H"],
                "isCurrentActor": true
            }),
        )
    }

    #[test]
    fn absent_fields_keep_their_values() {
        let seat = seated();
        let next = merge_seat(&seat, &json!({ "chips": 850 }));
        assert_eq!(next.chips, Some(850));
        assert_eq!(next.hole_cards, seat.hole_cards);
        assert_eq!(next.player_name, seat.player_name);
        assert!(next.is_current_actor);
    }

    #[test]
    fn explicit_null_clears_and_flags_are_coerced() {
        let next = merge_seat(&seated(), &json!({ "playerAvatar": null, "status": null, "isCurrentActor": 0 }));
        assert_eq!(next.player_avatar, None);
        assert_eq!(next.status, None);
        assert!(!next.is_current_actor);
    }

    #[test]
    fn numeric_player_ids_are_normalised() {
        let next = merge_seat(&SeatState::default(), &json!({ "playerId": 42 }));
        assert_eq!(next.player_id.as_deref(), Some("42"));
    }

    #[test]
    fn unrecognised_patch_is_a_noop_and_merge_is_idempotent() {
        let seat = seated();
        assert_eq!(merge_seat(&seat, &json!({ "unknown": 1 })), seat);
        assert_eq!(merge_seat(&seat, &json!("not an object")), seat);

        let patch = json!({ "chips": 10, "holeCards": ["2C", "2D"] });
        let once = merge_seat(&seat, &patch);
        assert_eq!(merge_seat(&once, &patch), once);
    }

    #[test]
    fn folded_seat_cannot_act_even_on_turn() {
        let seat = merge_seat(&seated(), &json!({ "status": "FOLDED" }));
        assert!(seat.is_current_actor);
        assert!(!seat.can_act());
        assert!(seated().can_act());
    }
}
