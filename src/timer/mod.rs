//! Turn countdown derived from the server-issued start instant and duration.

pub mod ticker;

pub use ticker::CountdownTicker;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;

/// Seconds left at which the countdown is rendered as urgent.
pub const URGENT_THRESHOLD_SECS: u64 = 5;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountdownView {
    /// Whole seconds left, rounded up.
    pub remaining: u64,
    /// Fraction of the turn still left, in `[0, 1]`.
    pub progress: f64,
}

impl CountdownView {
    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    pub fn is_urgent(&self) -> bool {
        self.remaining <= URGENT_THRESHOLD_SECS
    }
}

/// Project a turn deadline onto `now`.
///
/// Returns `None` when there is no running turn: start unknown, duration unknown,
/// non-finite or not positive. A start instant ahead of `now` counts as no time
/// elapsed.
pub fn project(
    start: Option<DateTime<Utc>>,
    duration_secs: Option<f64>,
    now: DateTime<Utc>,
) -> Option<CountdownView> {
    let start = start?;
    let duration = duration_secs.filter(|d| d.is_finite() && *d > 0.0)?;

    let elapsed = (now - start).num_milliseconds().max(0) as f64 / 1000.0;
    let remaining = (duration - elapsed).ceil().clamp(0.0, duration.ceil());
    let progress = (remaining / duration).clamp(0.0, 1.0);

    Some(CountdownView {
        remaining: remaining as u64,
        progress,
    })
}
