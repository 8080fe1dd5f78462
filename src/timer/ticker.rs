use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::tokio_tools::{spawn_named_task, TaskGuard};

use super::{project, Clock, CountdownView};

const LOG_TARGET: &str = "table_sync::timer";
const TICK: Duration = Duration::from_secs(1);

/// Publishes a [`CountdownView`] once per second for the current turn.
///
/// Every tick re-projects from the clock, so a late or skipped tick never skews
/// the displayed value. Ticking stops once the view reaches zero.
pub struct CountdownTicker {
    clock: Arc<dyn Clock>,
    tx: watch::Sender<Option<CountdownView>>,
    task: Option<TaskGuard<()>>,
}

impl CountdownTicker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            clock,
            tx,
            task: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CountdownView>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<CountdownView> {
        *self.tx.borrow()
    }

    pub fn is_ticking(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Restart the countdown for a new start instant or duration.
    pub fn retarget(&mut self, start: Option<DateTime<Utc>>, duration_secs: Option<f64>) {
        self.halt();

        let view = project(start, duration_secs, self.clock.now());
        self.tx.send_replace(view);
        debug!(
            target = LOG_TARGET,
            remaining = view.map(|v| v.remaining),
            "countdown retargeted"
        );

        let Some(view) = view else {
            return;
        };
        if view.is_expired() {
            return;
        }

        // Anchored here, not at the task's first poll.
        let first_tick = Instant::now() + TICK;
        let clock = Arc::clone(&self.clock);
        let tx = self.tx.clone();
        let handle = spawn_named_task("turn-countdown", async move {
            let mut ticks = interval_at(first_tick, TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let view = project(start, duration_secs, clock.now());
                tx.send_replace(view);
                if view.map_or(true, |v| v.is_expired()) {
                    debug!(target = LOG_TARGET, "countdown reached zero");
                    break;
                }
            }
        });
        self.task = Some(TaskGuard::new(handle));
    }

    /// Stop ticking and clear the published view.
    pub fn stop(&mut self) {
        self.halt();
        self.tx.send_replace(None);
    }

    fn halt(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.abort();
        }
    }
}
