// src/pipeline/aggregate.rs

//! Slot aggregation: per-slot fetching, caps, and the highlight rule.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{self, StreamExt};

use crate::error::FetchError;
use crate::models::{Config, Offer, SlotConfig, SlotMode, SlotQuery, Source};
use crate::services::{AdapterRegistry, SourceAdapter};

use super::fallback::{AttemptStatus, FallbackChain, SlotFetch, SourceAttempt};

/// Flag every price at or below `mean * ratio` of the known prices.
///
/// Unknown prices are never flagged and do not count toward the mean.
///
/// ```
/// use dealrelay::pipeline::highlight_flags;
///
/// let flags = highlight_flags(&[Some(100.0), Some(100.0), Some(100.0), Some(40.0)], 0.8);
/// assert_eq!(flags, vec![false, false, false, true]);
/// ```
pub fn highlight_flags(prices: &[Option<f64>], ratio: f64) -> Vec<bool> {
    let known: Vec<f64> = prices
        .iter()
        .flatten()
        .copied()
        .filter(|p| p.is_finite())
        .collect();
    if known.is_empty() {
        return vec![false; prices.len()];
    }

    let mean = known.iter().sum::<f64>() / known.len() as f64;
    let threshold = mean * ratio;

    prices
        .iter()
        .map(|price| matches!(price, Some(p) if p.is_finite() && *p <= threshold))
        .collect()
}

/// Offers selected for one slot in a cycle.
#[derive(Debug, Clone)]
pub struct SlotBatch {
    pub slot: String,
    pub offers: Vec<Offer>,
    /// Sent instead of offers when the slot came back empty
    pub empty_notice: Option<String>,
    pub attempts: Vec<SourceAttempt>,
    /// Set when the cycle cap dropped every offer this slot fetched
    pub capped_out: bool,
}

impl SlotBatch {
    /// No source produced anything for this slot.
    pub fn came_back_empty(&self) -> bool {
        self.offers.is_empty() && !self.capped_out
    }

    pub fn highlighted(&self) -> usize {
        self.offers.iter().filter(|o| o.is_highlighted()).count()
    }

    pub fn failures(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| matches!(a.status, AttemptStatus::Failed(_)))
            .count()
    }
}

/// Runs every configured slot against the adapter registry.
#[derive(Clone)]
pub struct Aggregator {
    registry: AdapterRegistry,
    slots: Vec<SlotConfig>,
    per_slot_cap: usize,
    max_offers_per_cycle: Option<usize>,
    max_concurrent: usize,
}

impl Aggregator {
    pub fn new(registry: AdapterRegistry, config: &Config) -> Self {
        Self {
            registry,
            slots: config.slots.clone(),
            per_slot_cap: config.policy.per_slot_cap,
            max_offers_per_cycle: config.policy.max_offers_per_cycle,
            max_concurrent: config.policy.max_concurrent.max(1),
        }
    }

    pub fn slots(&self) -> &[SlotConfig] {
        &self.slots
    }

    /// Fetch every slot, at most `max_concurrent` at a time.
    ///
    /// Batches come back in slot order regardless of completion order, and
    /// the global cap keeps earlier slots whole before later ones.
    pub async fn collect(&self) -> Vec<SlotBatch> {
        let mut batches: Vec<SlotBatch> = stream::iter(self.slots.iter())
            .map(|slot| self.run_slot(slot))
            .buffered(self.max_concurrent)
            .collect()
            .await;

        log_attempts(&batches);

        if let Some(limit) = self.max_offers_per_cycle {
            apply_global_cap(&mut batches, limit);
        }

        batches
    }

    /// Fetch a single slot, honoring its mode and cap.
    pub async fn run_slot(&self, slot: &SlotConfig) -> SlotBatch {
        let cap = slot.effective_cap(self.per_slot_cap);
        let adapters = self.registry.for_slot(slot);

        let fetch = match slot.mode {
            SlotMode::Fallback => FallbackChain::new(adapters).run(&slot.query, cap).await,
            SlotMode::Merge => merge(&adapters, &slot.query, cap).await,
        };

        let mut offers = fetch.offers;
        offers.truncate(cap);

        log::debug!(
            "Slot '{}': {} offer(s) after {} call(s)",
            slot.name,
            offers.len(),
            fetch.attempts.len()
        );

        SlotBatch {
            slot: slot.name.clone(),
            offers,
            empty_notice: slot.empty_notice.clone(),
            attempts: fetch.attempts,
            capped_out: false,
        }
    }
}

/// Query every adapter concurrently and concatenate in adapter order.
async fn merge(adapters: &[Arc<dyn SourceAdapter>], query: &SlotQuery, limit: usize) -> SlotFetch {
    let outcomes = join_all(adapters.iter().map(|adapter| adapter.fetch(query, limit))).await;

    let mut fetch = SlotFetch::default();
    for (adapter, outcome) in adapters.iter().zip(outcomes) {
        fetch
            .attempts
            .push(SourceAttempt::from_outcome(adapter.source(), &outcome));
        fetch.offers.extend(outcome.into_offers());
    }
    fetch
}

/// Trim batches in slot order so the cycle total stays within `limit`.
fn apply_global_cap(batches: &mut [SlotBatch], limit: usize) {
    let mut remaining = limit;
    for batch in batches {
        if batch.offers.len() > remaining {
            log::info!(
                "Slot '{}': cycle cap reached, dropping {} offer(s)",
                batch.slot,
                batch.offers.len() - remaining
            );
            batch.capped_out = remaining == 0;
            batch.offers.truncate(remaining);
        }
        remaining -= batch.offers.len();
    }
}

/// Log each adapter call. A missing credential is reported once per source
/// per cycle, however many slots use that source.
fn log_attempts(batches: &[SlotBatch]) {
    let mut missing: HashSet<(Source, &'static str)> = HashSet::new();

    for batch in batches {
        for attempt in &batch.attempts {
            let source = attempt.source;
            match &attempt.status {
                AttemptStatus::Found(count) => {
                    log::info!("Slot '{}': {} returned {} offer(s)", batch.slot, source, count);
                }
                AttemptStatus::Empty => {
                    log::info!("Slot '{}': {} returned no results", batch.slot, source);
                }
                AttemptStatus::Failed(FetchError::ConfigMissing(setting)) => {
                    if missing.insert((source, *setting)) {
                        log::warn!("{} skipped: {} is not configured", source, setting);
                    }
                }
                AttemptStatus::Failed(FetchError::Blocked(marker)) => {
                    log::warn!(
                        "Slot '{}': {} blocked the request (matched \"{}\")",
                        batch.slot,
                        source,
                        marker
                    );
                }
                AttemptStatus::Failed(error) => {
                    log::warn!("Slot '{}': {} failed: {}", batch.slot, source, error);
                }
            }
        }

        if batch.offers.is_empty() {
            log::info!("Slot '{}': nothing to send this cycle", batch.slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::pipeline::fallback::testing::{ScriptedAdapter, offer};
    use super::*;
    use crate::services::FetchOutcome;

    fn slot(name: &str, sources: Vec<Source>, mode: SlotMode, cap: Option<usize>) -> SlotConfig {
        SlotConfig {
            name: name.to_string(),
            sources,
            mode,
            cap,
            query: SlotQuery {
                keywords: "fone".into(),
                ..SlotQuery::default()
            },
            empty_notice: None,
        }
    }

    fn aggregator(registry: AdapterRegistry, slots: Vec<SlotConfig>) -> Aggregator {
        let mut config = Config::default();
        config.slots = slots;
        Aggregator::new(registry, &config)
    }

    #[test]
    fn test_highlight_only_well_below_mean() {
        let flags = highlight_flags(&[Some(100.0), Some(100.0), Some(100.0), Some(40.0)], 0.8);
        assert_eq!(flags, vec![false, false, false, true]);
    }

    #[test]
    fn test_highlight_ignores_unknown_prices() {
        let flags = highlight_flags(&[None, Some(50.0), Some(150.0), None], 0.8);
        // mean 100, threshold 80
        assert_eq!(flags, vec![false, true, false, false]);

        assert_eq!(highlight_flags(&[None, None], 0.8), vec![false, false]);
        assert!(highlight_flags(&[], 0.8).is_empty());
    }

    #[test]
    fn test_highlight_equal_prices_only_at_ratio_one() {
        let prices = [Some(10.0), Some(10.0)];
        assert_eq!(highlight_flags(&prices, 0.8), vec![false, false]);
        assert_eq!(highlight_flags(&prices, 1.0), vec![true, true]);
    }

    #[tokio::test]
    async fn test_merge_concatenates_in_source_order_and_caps() {
        let mut registry = AdapterRegistry::default();
        registry.insert(ScriptedAdapter::with_offers(Source::Marketplace, 2));
        registry.insert(ScriptedAdapter::with_offers(Source::Storefront, 2));

        let agg = aggregator(
            registry,
            vec![slot(
                "merge",
                vec![Source::Storefront, Source::Marketplace],
                SlotMode::Merge,
                Some(3),
            )],
        );
        let batch = agg.run_slot(&agg.slots()[0]).await;

        assert_eq!(
            batch.offers,
            vec![
                offer(Source::Storefront, 0),
                offer(Source::Storefront, 1),
                offer(Source::Marketplace, 0),
            ]
        );
        assert_eq!(batch.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_keeps_going_past_failures() {
        let mut registry = AdapterRegistry::default();
        registry.insert(ScriptedAdapter::new(
            Source::Marketplace,
            FetchOutcome::Failed(FetchError::Status(500)),
        ));
        registry.insert(ScriptedAdapter::with_offers(Source::Storefront, 1));

        let agg = aggregator(
            registry,
            vec![slot(
                "merge",
                vec![Source::Marketplace, Source::Storefront],
                SlotMode::Merge,
                None,
            )],
        );
        let batch = agg.run_slot(&agg.slots()[0]).await;

        assert_eq!(batch.offers, vec![offer(Source::Storefront, 0)]);
        assert_eq!(batch.failures(), 1);
    }

    #[tokio::test]
    async fn test_collect_preserves_slot_order_and_global_cap() {
        let mut registry = AdapterRegistry::default();
        registry.insert(ScriptedAdapter::with_offers(Source::Affiliate, 4));
        registry.insert(ScriptedAdapter::with_offers(Source::Partner, 4));
        registry.insert(ScriptedAdapter::new(Source::Storefront, FetchOutcome::Empty));

        let mut config = Config::default();
        config.policy.max_offers_per_cycle = Some(5);
        config.policy.max_concurrent = 2;
        config.slots = vec![
            slot("first", vec![Source::Affiliate], SlotMode::Fallback, Some(3)),
            slot("empty", vec![Source::Storefront], SlotMode::Fallback, None),
            slot("second", vec![Source::Partner], SlotMode::Fallback, Some(4)),
        ];
        let agg = Aggregator::new(registry, &config);

        let batches = agg.collect().await;
        let names: Vec<&str> = batches.iter().map(|b| b.slot.as_str()).collect();
        assert_eq!(names, vec!["first", "empty", "second"]);

        let counts: Vec<usize> = batches.iter().map(|b| b.offers.len()).collect();
        assert_eq!(counts, vec![3, 0, 2]);
        assert!(batches[1].came_back_empty());
        assert!(!batches[2].came_back_empty());
    }

    #[tokio::test]
    async fn test_slot_cut_by_cycle_cap_is_not_empty() {
        let mut registry = AdapterRegistry::default();
        registry.insert(ScriptedAdapter::with_offers(Source::Affiliate, 3));
        registry.insert(ScriptedAdapter::with_offers(Source::Partner, 3));

        let mut config = Config::default();
        config.policy.max_offers_per_cycle = Some(3);
        config.slots = vec![
            slot("first", vec![Source::Affiliate], SlotMode::Fallback, None),
            slot("second", vec![Source::Partner], SlotMode::Fallback, None),
        ];
        let batches = Aggregator::new(registry, &config).collect().await;

        assert_eq!(batches[0].offers.len(), 3);
        assert!(!batches[0].capped_out);
        assert!(batches[1].offers.is_empty());
        assert!(batches[1].capped_out);
        assert!(!batches[1].came_back_empty());
    }

    #[tokio::test]
    async fn test_unknown_source_yields_empty_batch() {
        let agg = aggregator(
            AdapterRegistry::default(),
            vec![slot("orphan", vec![Source::Partner], SlotMode::Fallback, None)],
        );
        let batches = agg.collect().await;
        assert_eq!(batches.len(), 1);
        assert!(batches[0].offers.is_empty());
        assert!(batches[0].attempts.is_empty());
    }
}
