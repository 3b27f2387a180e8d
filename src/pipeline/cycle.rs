// src/pipeline/cycle.rs

//! One aggregate-then-dispatch cycle, and the scheduled loop around it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::channel::MessageChannel;
use crate::error::Result;
use crate::models::{Config, SessionState, Subscriptions};
use crate::services::AdapterRegistry;

use super::aggregate::{Aggregator, SlotBatch};
use super::dispatch::{DispatchReport, Dispatcher};
use super::fallback::AttemptStatus;
use super::scheduler::Scheduler;

/// Summary of one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleStats {
    pub slots: usize,
    pub empty_slots: usize,
    pub offers: usize,
    pub highlighted: usize,
    /// Failed adapter calls, by `FetchError::kind`
    pub source_failures: BTreeMap<&'static str, usize>,
    pub dispatch: DispatchReport,
    pub elapsed: Duration,
}

impl CycleStats {
    pub fn new(batches: &[SlotBatch], dispatch: DispatchReport, elapsed: Duration) -> Self {
        let mut source_failures = BTreeMap::new();
        for attempt in batches.iter().flat_map(|b| &b.attempts) {
            if let AttemptStatus::Failed(error) = &attempt.status {
                *source_failures.entry(error.kind()).or_insert(0) += 1;
            }
        }

        Self {
            slots: batches.len(),
            empty_slots: batches.iter().filter(|b| b.came_back_empty()).count(),
            offers: batches.iter().map(|b| b.offers.len()).sum(),
            highlighted: batches.iter().map(SlotBatch::highlighted).sum(),
            source_failures,
            dispatch,
            elapsed,
        }
    }

    fn log(&self) {
        log::info!(
            "Cycle done in {:.1}s: {} slot(s) ({} empty), {} offer(s) ({} highlighted), {} sent, {} failed",
            self.elapsed.as_secs_f64(),
            self.slots,
            self.empty_slots,
            self.offers,
            self.highlighted,
            self.dispatch.sent,
            self.dispatch.failed
        );
        if !self.source_failures.is_empty() {
            let failures: Vec<String> = self
                .source_failures
                .iter()
                .map(|(kind, count)| format!("{kind}={count}"))
                .collect();
            log::info!("Source failures: {}", failures.join(", "));
        }
    }
}

/// Aggregator and dispatcher wired together.
pub struct Pipeline {
    aggregator: Aggregator,
    dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(aggregator: Aggregator, dispatcher: Dispatcher) -> Self {
        Self {
            aggregator,
            dispatcher,
        }
    }

    /// Build every adapter from configuration, sending through `channel`.
    pub fn from_config(config: &Config, client: Client, channel: Arc<dyn MessageChannel>) -> Result<Self> {
        let registry = AdapterRegistry::from_config(config, client)?;
        Ok(Self::new(
            Aggregator::new(registry, config),
            Dispatcher::from_config(channel, &config.dispatch),
        ))
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Aggregate every slot, then dispatch to the given subscriptions.
    pub async fn run_cycle(&self, subscriptions: &Subscriptions) -> CycleStats {
        let started = Instant::now();

        let batches = self.aggregator.collect().await;
        let report = self.dispatcher.dispatch(&batches, subscriptions).await;

        let stats = CycleStats::new(&batches, report, started.elapsed());
        stats.log();
        stats
    }
}

/// Run cycles on the scheduler until shutdown, taking a fresh subscription
/// snapshot at the start of each cycle.
pub async fn run_scheduled(
    pipeline: Arc<Pipeline>,
    session: Arc<SessionState>,
    scheduler: Scheduler,
    shutdown: watch::Receiver<bool>,
) -> usize {
    log::info!(
        "Scheduler started: every {}s, {} slot(s)",
        scheduler.interval().as_secs(),
        pipeline.aggregator().slots().len()
    );

    scheduler
        .run(
            || {
                let pipeline = pipeline.clone();
                let session = session.clone();
                async move {
                    let subscriptions = session.snapshot().await;
                    pipeline.run_cycle(&subscriptions).await;
                }
            },
            shutdown,
        )
        .await
}
