//! Presence-checked field application for sparse JSON patches.
//!
//! A key that is missing from the patch leaves the slot untouched. A key set to
//! `null` clears an optional slot. A value of the wrong shape is skipped for
//! that field only.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{chips_from_value, Chips};

const LOG_TARGET: &str = "table_sync::store::patch";

pub(crate) type Patch = Map<String, Value>;

/// Overwrite an optional slot when the key is present.
pub(crate) fn apply_optional<T>(slot: &mut Option<T>, patch: &Patch, key: &str)
where
    T: DeserializeOwned,
{
    let Some(raw) = patch.get(key) else {
        return;
    };
    if raw.is_null() {
        *slot = None;
        return;
    }
    match T::deserialize(raw) {
        Ok(value) => *slot = Some(value),
        Err(err) => {
            debug!(target = LOG_TARGET, field = key, error = %err, "ignoring malformed field");
        }
    }
}

/// Overwrite a chip amount when the key is present; fractional amounts round to
/// the nearest chip and anything unreadable keeps the current value.
pub(crate) fn apply_chips(slot: &mut Option<Chips>, patch: &Patch, key: &str) {
    let Some(raw) = patch.get(key) else {
        return;
    };
    if raw.is_null() {
        *slot = None;
        return;
    }
    match chips_from_value(raw) {
        Some(amount) => *slot = Some(amount),
        None => {
            debug!(target = LOG_TARGET, field = key, "ignoring malformed amount");
        }
    }
}

/// Replace a list wholesale when the key is present. Non-array values clear it;
/// elements that fail to decode are dropped.
pub(crate) fn apply_list<T>(slot: &mut Vec<T>, patch: &Patch, key: &str)
where
    T: DeserializeOwned,
{
    apply_list_with(slot, patch, key, |item| T::deserialize(item).ok());
}

pub(crate) fn apply_list_with<T, F>(slot: &mut Vec<T>, patch: &Patch, key: &str, decode: F)
where
    F: Fn(&Value) -> Option<T>,
{
    let Some(raw) = patch.get(key) else {
        return;
    };
    *slot = match raw.as_array() {
        Some(items) => items.iter().filter_map(&decode).collect(),
        None => Vec::new(),
    };
}

/// Overwrite an identity slot; numeric identities are normalised to strings.
pub(crate) fn apply_identity(slot: &mut Option<String>, patch: &Patch, key: &str) {
    match patch.get(key) {
        None => {}
        Some(Value::Null) => *slot = None,
        Some(Value::String(id)) => *slot = Some(id.clone()),
        Some(Value::Number(id)) => *slot = Some(id.to_string()),
        Some(_) => {
            debug!(target = LOG_TARGET, field = key, "ignoring malformed identity");
        }
    }
}

/// Coerce a present value to a strict boolean using JSON truthiness.
pub(crate) fn apply_flag(slot: &mut bool, patch: &Patch, key: &str) {
    if let Some(raw) = patch.get(key) {
        *slot = truthy(raw);
    }
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0 && !v.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
