// src/pipeline/fallback.rs

//! Ordered fallback across adapters for one slot.

use std::sync::Arc;

use crate::error::FetchError;
use crate::models::{Offer, SlotQuery, Source};
use crate::services::{FetchOutcome, SourceAdapter};

/// What one adapter call produced, without the offers themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptStatus {
    Found(usize),
    Empty,
    Failed(FetchError),
}

/// One adapter call made while filling a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAttempt {
    pub source: Source,
    pub status: AttemptStatus,
}

impl SourceAttempt {
    pub fn from_outcome(source: Source, outcome: &FetchOutcome) -> Self {
        let status = match outcome {
            FetchOutcome::Found(offers) => AttemptStatus::Found(offers.len()),
            FetchOutcome::Empty => AttemptStatus::Empty,
            FetchOutcome::Failed(error) => AttemptStatus::Failed(error.clone()),
        };
        Self { source, status }
    }
}

/// Offers gathered for a slot plus the calls that produced them.
#[derive(Debug, Clone, Default)]
pub struct SlotFetch {
    pub offers: Vec<Offer>,
    pub attempts: Vec<SourceAttempt>,
}

/// Adapters tried in a fixed priority order until one yields offers.
///
/// The chain makes a single pass: it never retries an adapter (retries live
/// inside the adapter) and never calls adapters after the first hit.
#[derive(Clone)]
pub struct FallbackChain {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl FallbackChain {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub async fn run(&self, query: &SlotQuery, limit: usize) -> SlotFetch {
        let mut attempts = Vec::with_capacity(self.adapters.len());

        for adapter in &self.adapters {
            let outcome = adapter.fetch(query, limit).await;
            attempts.push(SourceAttempt::from_outcome(adapter.source(), &outcome));

            if outcome.has_offers() {
                let mut offers = outcome.into_offers();
                offers.truncate(limit);
                return SlotFetch { offers, attempts };
            }
        }

        SlotFetch {
            offers: Vec::new(),
            attempts,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted adapters shared by pipeline tests.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    pub fn offer(source: Source, n: usize) -> Offer {
        Offer::new(
            source,
            &format!("{source} item {n}"),
            &format!("https://{source}.test/item/{n}"),
            Some("99.90"),
            "see price",
        )
        .unwrap()
    }

    /// Adapter returning a canned outcome and counting its calls.
    pub struct ScriptedAdapter {
        source: Source,
        outcome: FetchOutcome,
        calls: AtomicUsize,
    }

    impl ScriptedAdapter {
        pub fn new(source: Source, outcome: FetchOutcome) -> Arc<Self> {
            Arc::new(Self {
                source,
                outcome,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn with_offers(source: Source, count: usize) -> Arc<Self> {
            let offers = (0..count).map(|n| offer(source, n)).collect();
            Self::new(source, FetchOutcome::Found(offers))
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn source(&self) -> Source {
            self.source
        }

        async fn fetch(&self, _query: &SlotQuery, limit: usize) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                FetchOutcome::Found(offers) => {
                    FetchOutcome::Found(offers.iter().take(limit).cloned().collect())
                }
                other => other.clone(),
            }
        }
    }
}
