use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ActionKind, Chips, GameMode, ParticipantId, SessionId, TableId};

/// Everything that changes what a join means. Doubles as the coalescing key, so two
/// requests only share work when every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinRequest {
    pub table_id: TableId,
    pub participant_id: ParticipantId,
    pub currency: String,
    pub mode: GameMode,
    pub token: Option<String>,
}

impl JoinRequest {
    pub fn body(&self) -> JoinBody<'_> {
        JoinBody {
            player_token: self.token.as_deref(),
            currency: &self.currency,
            mode: self.mode,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBody<'a> {
    pub player_token: Option<&'a str>,
    pub currency: &'a str,
    pub mode: GameMode,
}

/// Parameters of a full state read. Also used as the coalescing key for syncs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateQuery {
    pub table_id: TableId,
    pub participant_id: ParticipantId,
    pub session_id: Option<SessionId>,
    pub currency: Option<String>,
    pub mode: Option<GameMode>,
}

/// A participant action as posted to the action endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSubmission {
    pub action: ActionKind,
    pub amount: Chips,
    pub session_id: SessionId,
    pub player_id: ParticipantId,
    pub table_id: TableId,
}

/// Session+seat snapshot with any `{ data: ... }` envelope removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(Value);

impl Snapshot {
    /// Accepts wrapped and bare bodies; `null`/empty bodies yield nothing.
    pub fn from_body(body: Value) -> Option<Self> {
        let inner = match body {
            Value::Object(mut map) => match map.remove("data") {
                Some(data) if !data.is_null() => data,
                Some(_) | None => Value::Object(map),
            },
            other => other,
        };
        match inner {
            Value::Null => None,
            other => Some(Self(other)),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The local participant's seat: `mySeat` when present, otherwise the seat-list
    /// entry whose `playerId` matches.
    pub fn local_seat(&self, participant: &str) -> Option<&Value> {
        if let Some(seat) = self.0.get("mySeat").filter(|seat| !seat.is_null()) {
            return Some(seat);
        }
        self.0
            .get("seats")?
            .as_array()?
            .iter()
            .find(|seat| seat.get("playerId").is_some_and(|id| id_matches(id, participant)))
    }
}

fn id_matches(raw: &Value, participant: &str) -> bool {
    match raw {
        Value::String(id) => id == participant,
        Value::Number(id) => id.to_string() == participant,
        _ => false,
    }
}

/// Error bodies carry an optional `message`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_is_optional() {
        let wrapped = Snapshot::from_body(json!({ "data": { "sessionId": "S1" } })).unwrap();
        let bare = Snapshot::from_body(json!({ "sessionId": "S1" })).unwrap();
        assert_eq!(wrapped, bare);
        assert!(Snapshot::from_body(Value::Null).is_none());
        assert!(Snapshot::from_body(json!({ "data": null })).is_some());
    }

    #[test]
    fn local_seat_prefers_my_seat_then_matching_entry() {
        let snap = Snapshot::from_body(json!({
            "mySeat": { "playerId": "P1", "chips": 5 },
            "seats": [{ "playerId": "P1", "chips": 9 }]
        }))
        .unwrap();
        assert_eq!(snap.local_seat("P1").unwrap()["chips"], 5);

        let snap = Snapshot::from_body(json!({
            "mySeat": null,
            "seats": [null, { "playerId": 7, "chips": 9 }]
        }))
        .unwrap();
        assert_eq!(snap.local_seat("7").unwrap()["chips"], 9);
        assert!(snap.local_seat("P1").is_none());
    }

    #[test]
    fn join_body_uses_wire_names() {
        let request = JoinRequest {
            table_id: "T1".into(),
            participant_id: "P1".into(),
            currency: "PC".into(),
            mode: GameMode::Demo,
            token: None,
        };
        assert_eq!(
            serde_json::to_value(request.body()).unwrap(),
            json!({ "playerToken": null, "currency": "PC", "mode": "DEMO" })
        );
    }
}
