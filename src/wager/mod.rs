//! Maps a continuous drag gesture onto a clamped, stepped wager amount.

use crate::domain::{ActionKind, AllowedAction, Chips};

/// Divisions of the wager window used while dragging.
pub const DRAG_RESOLUTION: Chips = 500;
/// Divisions used by the decrement control and typed input.
pub const STEP_RESOLUTION: Chips = 200;

/// Step size for a `[min, max]` window divided into `resolution` parts. Never below 1.
pub fn step_for(min: Chips, max: Chips, resolution: Chips) -> Chips {
    (max.saturating_sub(min) / resolution.max(1)).max(1)
}

/// Quantize a raw drag value into the `[min, max]` window.
///
/// Values within two drag steps of `max` snap to `max`; everything else is rounded
/// to the nearest step multiple and clamped. A window with `max <= min` always
/// yields `min`.
pub fn quantize(raw: f64, min: Chips, max: Chips) -> Chips {
    if max <= min {
        return min;
    }
    if !raw.is_finite() {
        return if raw == f64::INFINITY { max } else { min };
    }

    let step = step_for(min, max, DRAG_RESOLUTION);
    let snap_from = max.saturating_sub(step.saturating_mul(2));
    if raw >= snap_from as f64 {
        return max;
    }

    let stepped = (raw / step as f64).round() * step as f64;
    if stepped <= min as f64 {
        min
    } else {
        (stepped as Chips).min(max)
    }
}

/// One decrement-control press.
pub fn decrement(current: Chips, min: Chips, max: Chips) -> Chips {
    current
        .saturating_sub(step_for(min, max, STEP_RESOLUTION))
        .max(min)
}

/// Slider session for a BET or RAISE.
#[derive(Debug, Clone, PartialEq)]
pub struct WagerSelector {
    kind: ActionKind,
    min: Chips,
    max: Chips,
    amount: Chips,
}

impl WagerSelector {
    /// Opens at the action's minimum. Only wager-taking actions open a slider.
    pub fn open(action: &AllowedAction) -> Option<Self> {
        if !action.action.takes_wager() {
            return None;
        }
        let (min, max) = action.wager_bounds();
        Some(Self {
            kind: action.action.clone(),
            min,
            max,
            amount: min,
        })
    }

    /// Open the slider for `kind` using the matching entry of `allowed`.
    pub fn open_for(kind: &ActionKind, allowed: &[AllowedAction]) -> Option<Self> {
        allowed
            .iter()
            .find(|entry| &entry.action == kind)
            .and_then(Self::open)
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn bounds(&self) -> (Chips, Chips) {
        (self.min, self.max)
    }

    pub fn amount(&self) -> Chips {
        self.amount
    }

    pub fn drag(&mut self, raw: f64) -> Chips {
        self.amount = quantize(raw, self.min, self.max);
        self.amount
    }

    pub fn decrease(&mut self) -> Chips {
        self.amount = decrement(self.amount, self.min, self.max);
        self.amount
    }

    /// Abandon the gesture; the slider returns to its minimum.
    pub fn cancel(&mut self) {
        self.amount = self.min;
    }

    pub fn can_decrease(&self) -> bool {
        self.amount > self.min
    }

    /// Slider fill in percent; 0 for a degenerate window.
    pub fn fill_percentage(&self) -> f64 {
        if self.max <= self.min {
            return 0.0;
        }
        (self.amount.saturating_sub(self.min)) as f64 / (self.max - self.min) as f64 * 100.0
    }
}
