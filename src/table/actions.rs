use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::{ActionKind, AllowedAction, Chips};
use crate::error::SubmitError;
use crate::store::{SeatState, SessionState};

/// Amount sent with `kind` when the participant did not pick one.
pub fn default_amount(kind: &ActionKind, allowed: &[AllowedAction]) -> Chips {
    let entry = allowed.iter().find(|entry| &entry.action == kind);
    match kind {
        ActionKind::Call | ActionKind::AllIn => entry.and_then(|e| e.call_amount).unwrap_or(0),
        ActionKind::Bet | ActionKind::Raise => entry.and_then(|e| e.min_raise_amount).unwrap_or(0),
        _ => 0,
    }
}

/// Whether the local participant holds the turn and may act at all.
pub fn can_act(seat: &SeatState, session: &SessionState) -> bool {
    session.has_session() && seat.can_act() && !session.allowed_actions.is_empty()
}

/// Check that `kind` may be submitted now.
pub fn ensure_permitted(
    kind: &ActionKind,
    seat: &SeatState,
    session: &SessionState,
) -> Result<(), SubmitError> {
    if !session.has_session() {
        return Err(SubmitError::NoSession);
    }
    if !can_act(seat, session) || session.allowed(kind).is_none() {
        return Err(SubmitError::NotPermitted(kind.to_string()));
    }
    Ok(())
}

/// Single-slot latch; at most one submission holds it at a time.
#[derive(Debug, Default)]
pub struct SubmitLatch {
    busy: AtomicBool,
}

impl SubmitLatch {
    pub fn try_acquire(&self) -> Result<SubmitPermit<'_>, SubmitError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| SubmitPermit { latch: self })
            .map_err(|_| SubmitError::AlreadySubmitting)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the latch when dropped.
#[derive(Debug)]
pub struct SubmitPermit<'a> {
    latch: &'a SubmitLatch,
}

impl Drop for SubmitPermit<'_> {
    fn drop(&mut self) {
        self.latch.busy.store(false, Ordering::Release);
    }
}
