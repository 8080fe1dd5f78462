//! Core domain types shared by the stores, the API client and the action bar.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ---------- Common type aliases ----------
pub type Chips = u64;
pub type SeatIndex = i64;
pub type TableId = String;
pub type ParticipantId = String;
pub type SessionId = String;
/// Cards arrive as engine-formatted strings (e.g. `"14H"`); the client never interprets them.
pub type Card = String;

/// Read a chip amount from a wire value.
///
/// The engine reports amounts as JSON numbers that are not always whole. Finite,
/// non-negative numbers (or numeric strings) round to the nearest chip; anything
/// else has no amount.
pub fn chips_from_value(value: &Value) -> Option<Chips> {
    let amount = match value {
        Value::Number(n) => {
            if let Some(whole) = n.as_u64() {
                return Some(whole);
            }
            n.as_f64()?
        }
        Value::String(raw) => raw.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (amount.is_finite() && amount >= 0.0).then(|| amount.round() as Chips)
}

/// `deserialize_with` helpers built on [`chips_from_value`].
pub mod lenient_chips {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{chips_from_value, Chips};

    /// Malformed amounts decode as `None` instead of failing the whole record.
    pub fn optional<'de, D>(deserializer: D) -> Result<Option<Chips>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(chips_from_value))
    }

    pub fn or_zero<'de, D>(deserializer: D) -> Result<Chips, D::Error>
    where
        D: Deserializer<'de>,
    {
        optional(deserializer).map(Option::unwrap_or_default)
    }
}

/// ---------- Enums ----------

/// Seat status as reported by the game engine.
///
/// The engine owns the enumeration; values the client does not know are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SeatStatus {
    Active,
    Waiting,
    SittingOut,
    Folded,
    AllIn,
    Quit,
    Winner,
    Other(String),
}

impl SeatStatus {
    /// Statuses that can no longer act in the current hand.
    pub fn blocks_action(&self) -> bool {
        matches!(self, SeatStatus::Folded | SeatStatus::AllIn | SeatStatus::Quit)
    }

    pub fn as_str(&self) -> &str {
        match self {
            SeatStatus::Active => "ACTIVE",
            SeatStatus::Waiting => "WAITING",
            SeatStatus::SittingOut => "SITTING_OUT",
            SeatStatus::Folded => "FOLDED",
            SeatStatus::AllIn => "ALL_IN",
            SeatStatus::Quit => "QUIT",
            SeatStatus::Winner => "WINNER",
            SeatStatus::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for SeatStatus {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "ACTIVE" => SeatStatus::Active,
            "WAITING" => SeatStatus::Waiting,
            "SITTING_OUT" => SeatStatus::SittingOut,
            "FOLDED" => SeatStatus::Folded,
            "ALL_IN" => SeatStatus::AllIn,
            "QUIT" => SeatStatus::Quit,
            "WINNER" => SeatStatus::Winner,
            _ => SeatStatus::Other(raw),
        }
    }
}

impl From<SeatStatus> for String {
    fn from(status: SeatStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action tags a participant may submit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
    Other(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Fold => "FOLD",
            ActionKind::Check => "CHECK",
            ActionKind::Call => "CALL",
            ActionKind::Bet => "BET",
            ActionKind::Raise => "RAISE",
            ActionKind::AllIn => "ALL_IN",
            ActionKind::Other(raw) => raw.as_str(),
        }
    }

    /// BET and RAISE pick their amount through the wager selector.
    pub fn takes_wager(&self) -> bool {
        matches!(self, ActionKind::Bet | ActionKind::Raise)
    }
}

impl From<String> for ActionKind {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "FOLD" => ActionKind::Fold,
            "CHECK" => ActionKind::Check,
            "CALL" => ActionKind::Call,
            "BET" => ActionKind::Bet,
            "RAISE" => ActionKind::Raise,
            "ALL_IN" => ActionKind::AllIn,
            _ => ActionKind::Other(raw),
        }
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Play-money or real-money table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameMode {
    Real,
    Demo,
}

impl GameMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::Real => "REAL",
            GameMode::Demo => "DEMO",
        }
    }

    /// Case-insensitive parse; anything but `REAL`/`DEMO` is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "REAL" => Some(GameMode::Real),
            "DEMO" => Some(GameMode::Demo),
            _ => None,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ---------- Session payload entries ----------

/// One entry of the allowed-action list for the current actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedAction {
    pub action: ActionKind,
    #[serde(
        default,
        deserialize_with = "lenient_chips::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub call_amount: Option<Chips>,
    #[serde(
        default,
        deserialize_with = "lenient_chips::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_raise_amount: Option<Chips>,
    #[serde(
        default,
        deserialize_with = "lenient_chips::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_raise_amount: Option<Chips>,
}

impl AllowedAction {
    /// Selector window declared by a BET or RAISE entry; missing bounds read as zero.
    pub fn wager_bounds(&self) -> (Chips, Chips) {
        (
            self.min_raise_amount.unwrap_or(0),
            self.max_raise_amount.unwrap_or(0),
        )
    }
}

/// Payout record for one seat from the most recently completed hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandResult {
    pub seat_index: SeatIndex,
    #[serde(default)]
    pub hand_rank: String,
    #[serde(default, deserialize_with = "lenient_chips::or_zero")]
    pub payout_amount: Chips,
}

/// Table configuration returned by the table endpoint. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    #[serde(default)]
    pub seat_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient_chips::optional")]
    pub small_blind: Option<Chips>,
    #[serde(default, deserialize_with = "lenient_chips::optional")]
    pub big_blind: Option<Chips>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parsing_is_case_insensitive_and_keeps_unknowns() {
        let folded: SeatStatus = serde_json::from_value(json!("folded")).unwrap();
        assert_eq!(folded, SeatStatus::Folded);
        assert!(folded.blocks_action());

        let odd: SeatStatus = serde_json::from_value(json!("SPECTATING")).unwrap();
        assert_eq!(odd, SeatStatus::Other("SPECTATING".into()));
        assert!(!odd.blocks_action());
        assert_eq!(serde_json::to_value(&odd).unwrap(), json!("SPECTATING"));
    }

    #[test]
    fn allowed_action_reads_wire_shape() {
        let entry: AllowedAction = serde_json::from_value(json!({
            "action": "RAISE",
            "minRaiseAmount": 20,
            "maxRaiseAmount": 2000
        }))
        .unwrap();
        assert_eq!(entry.action, ActionKind::Raise);
        assert!(entry.action.takes_wager());
        assert_eq!(entry.wager_bounds(), (20, 2000));
        assert_eq!(entry.call_amount, None);
    }

    #[test]
    fn amounts_decode_leniently() {
        assert_eq!(chips_from_value(&json!(20)), Some(20));
        assert_eq!(chips_from_value(&json!(20.4)), Some(20));
        assert_eq!(chips_from_value(&json!(" 7.5 ")), Some(8));
        assert_eq!(chips_from_value(&json!(-1)), None);
        assert_eq!(chips_from_value(&json!(true)), None);

        let result: HandResult = serde_json::from_value(json!({
            "seatIndex": 2,
            "handRank": "Flush",
            "payoutAmount": 152.5
        }))
        .unwrap();
        assert_eq!(result.payout_amount, 153);

        let entry: AllowedAction = serde_json::from_value(json!({
            "action": "CALL",
            "callAmount": null,
            "minRaiseAmount": {}
        }))
        .unwrap();
        assert_eq!(entry.call_amount, None);
        assert_eq!(entry.wager_bounds(), (0, 0));
    }

    #[test]
    fn mode_parse_rejects_other_values() {
        assert_eq!(GameMode::parse("real"), Some(GameMode::Real));
        assert_eq!(GameMode::parse(" Demo "), Some(GameMode::Demo));
        assert_eq!(GameMode::parse("practice"), None);
    }
}
