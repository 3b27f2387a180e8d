// src/pipeline/scheduler.rs

//! Fixed-interval cycle scheduler.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::models::ScheduleConfig;

/// Runs a cycle on a fixed interval, one cycle at a time.
///
/// Cycles run inline in the timer loop, so a cycle that outlasts the
/// interval delays the next one and the ticks it overlapped are dropped.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self::new(Duration::from_secs(config.interval_secs))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    ///
    /// The first cycle starts immediately. A cycle in flight when shutdown
    /// is requested runs to completion. Returns the number of cycles run.
    pub async fn run<F, Fut>(&self, mut cycle: F, mut shutdown: watch::Receiver<bool>) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycles = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        log::debug!("Shutdown sender dropped, stopping scheduler");
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            cycle().await;
            cycles += 1;

            let elapsed = started.elapsed();
            if elapsed > self.interval {
                log::warn!(
                    "Cycle took {:.1}s, longer than the {:.1}s interval; overlapping ticks skipped",
                    elapsed.as_secs_f64(),
                    self.interval.as_secs_f64()
                );
            }
        }

        log::info!("Scheduler stopped after {cycles} cycle(s)");
        cycles
    }
}
