//! Source adapters.
//!
//! One adapter per product-data source:
//! - Marketplace search API (`MarketplaceAdapter`)
//! - HTML-scraped storefront (`StorefrontAdapter`)
//! - Affiliate GraphQL API (`AffiliateAdapter`)
//! - Partner-signed commerce API (`PartnerAdapter`)
//!
//! Every adapter maps its source into [`Offer`]s and reports failures as a
//! [`FetchOutcome`] instead of an error, so nothing past this boundary has to
//! handle adapter errors.

mod affiliate;
mod marketplace;
mod partner;
mod retry;
mod storefront;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{FetchError, Result};
use crate::models::{Config, Offer, SlotConfig, SlotQuery, Source};

pub use affiliate::AffiliateAdapter;
pub use marketplace::MarketplaceAdapter;
pub use partner::PartnerAdapter;
pub use retry::RetryPolicy;
pub use storefront::StorefrontAdapter;

/// Result of one adapter invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// At least one offer
    Found(Vec<Offer>),
    /// The source answered and had nothing
    Empty,
    /// The source could not be used this time
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn from_result(result: std::result::Result<Vec<Offer>, FetchError>) -> Self {
        match result {
            Ok(offers) if offers.is_empty() => Self::Empty,
            Ok(offers) => Self::Found(offers),
            Err(error) => Self::Failed(error),
        }
    }

    pub fn has_offers(&self) -> bool {
        matches!(self, Self::Found(offers) if !offers.is_empty())
    }

    pub fn offers(&self) -> &[Offer] {
        match self {
            Self::Found(offers) => offers,
            _ => &[],
        }
    }

    pub fn into_offers(self) -> Vec<Offer> {
        match self {
            Self::Found(offers) => offers,
            _ => Vec::new(),
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Integration with one external product-data source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Fetch at most `limit` offers for `query`. Never fails.
    async fn fetch(&self, query: &SlotQuery, limit: usize) -> FetchOutcome;
}

/// Collaborators shared by every adapter.
#[derive(Clone)]
pub struct AdapterContext {
    pub client: Client,
    pub retry: RetryPolicy,
    /// Shown in place of a price the source did not provide
    pub price_fallback: String,
}

impl AdapterContext {
    pub fn from_config(config: &Config, client: Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::from_config(&config.retry),
            price_fallback: config.dispatch.price_fallback.clone(),
        }
    }
}

/// Adapters available to the aggregator, keyed by source.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Source, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    /// Build one adapter per source from the configuration.
    pub fn from_config(config: &Config, client: Client) -> Result<Self> {
        let ctx = AdapterContext::from_config(config, client);
        let mut registry = Self::default();

        registry.insert(Arc::new(MarketplaceAdapter::new(
            ctx.clone(),
            config.sources.marketplace.clone(),
            &config.policy,
        )));
        registry.insert(Arc::new(StorefrontAdapter::new(
            ctx.clone(),
            config.sources.storefront.clone(),
        )?));
        registry.insert(Arc::new(AffiliateAdapter::new(
            ctx.clone(),
            config.sources.affiliate.clone(),
        )));
        registry.insert(Arc::new(PartnerAdapter::new(
            ctx,
            config.sources.partner.clone(),
        )));

        Ok(registry)
    }

    /// Register an adapter, replacing any previous one for the same source.
    pub fn insert(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.source(), adapter);
    }

    pub fn get(&self, source: Source) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&source).cloned()
    }

    /// Adapters for a slot, in the slot's priority order.
    pub fn for_slot(&self, slot: &SlotConfig) -> Vec<Arc<dyn SourceAdapter>> {
        slot.sources
            .iter()
            .filter_map(|source| {
                let adapter = self.get(*source);
                if adapter.is_none() {
                    log::warn!("Slot '{}': no adapter registered for {}", slot.name, source);
                }
                adapter
            })
            .collect()
    }
}

/// Query keywords, or `ConfigMissing` when the slot has none.
fn require_keywords(query: &SlotQuery) -> std::result::Result<&str, FetchError> {
    let keywords = query.keywords.trim();
    if keywords.is_empty() {
        return Err(FetchError::ConfigMissing("slot.keywords"));
    }
    Ok(keywords)
}

/// A configured credential, or `ConfigMissing` naming the setting.
fn require<'a>(
    value: &'a Option<String>,
    name: &'static str,
) -> std::result::Result<&'a str, FetchError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(FetchError::ConfigMissing(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(n: usize) -> Offer {
        Offer::new(
            Source::Marketplace,
            &format!("Item {n}"),
            &format!("https://x.test/{n}"),
            Some("10.00"),
            "n/a",
        )
        .unwrap()
    }

    #[test]
    fn test_outcome_from_result() {
        assert_eq!(FetchOutcome::from_result(Ok(vec![])), FetchOutcome::Empty);
        assert!(FetchOutcome::from_result(Ok(vec![offer(1)])).has_offers());

        let failed = FetchOutcome::from_result(Err(FetchError::Status(503)));
        assert!(!failed.has_offers());
        assert!(failed.offers().is_empty());
        assert_eq!(failed.error(), Some(&FetchError::Status(503)));
    }

    #[test]
    fn test_require_helpers() {
        assert_eq!(
            require(&None, "partner.partner_id"),
            Err(FetchError::ConfigMissing("partner.partner_id"))
        );
        assert_eq!(
            require(&Some("  ".into()), "partner.partner_id"),
            Err(FetchError::ConfigMissing("partner.partner_id"))
        );
        assert_eq!(require(&Some(" 42 ".into()), "x"), Ok("42"));

        let blank = SlotQuery::default();
        assert!(require_keywords(&blank).is_err());
    }

    #[test]
    fn test_registry_from_default_config() {
        let config = Config::default();
        let client = Client::new();
        let registry = AdapterRegistry::from_config(&config, client).unwrap();

        for source in Source::ALL {
            assert_eq!(registry.get(source).unwrap().source(), source);
        }

        let adapters = registry.for_slot(&config.slots[1]);
        let order: Vec<Source> = adapters.iter().map(|a| a.source()).collect();
        assert_eq!(order, config.slots[1].sources);
    }
}
