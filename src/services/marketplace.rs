// src/services/marketplace.rs

//! Marketplace search API adapter.
//!
//! Queries `GET {base}/sites/{site}/search` for a candidate batch larger than
//! the requested limit, flags offers priced well below the batch mean, then
//! keeps the first `limit` offers in the API's own order.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::FetchError;
use crate::models::{MarketplaceConfig, Offer, PolicyConfig, SlotQuery, Source};
use crate::pipeline::highlight_flags;
use crate::utils::http::fetch_text;
use crate::utils::upgrade_to_https;

use super::{AdapterContext, FetchOutcome, SourceAdapter};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

pub struct MarketplaceAdapter {
    ctx: AdapterContext,
    config: MarketplaceConfig,
    candidate_pool: usize,
    highlight_ratio: f64,
}

impl MarketplaceAdapter {
    pub fn new(ctx: AdapterContext, config: MarketplaceConfig, policy: &PolicyConfig) -> Self {
        Self {
            ctx,
            config,
            candidate_pool: policy.candidate_pool,
            highlight_ratio: policy.highlight_ratio,
        }
    }

    async fn try_fetch(&self, query: &SlotQuery, limit: usize) -> Result<Vec<Offer>, FetchError> {
        let keywords = query.keywords.trim();
        if keywords.is_empty() && query.category.is_none() {
            return Err(FetchError::ConfigMissing("slot.keywords or slot.category"));
        }

        let url = format!(
            "{}/sites/{}/search",
            self.config.base_url.trim_end_matches('/'),
            self.config.site_id
        );
        let pool = self.candidate_pool.max(limit);

        let body = self
            .ctx
            .retry
            .run("marketplace", || {
                let mut request = self.ctx.client.get(&url).query(&[("limit", pool)]);
                if !keywords.is_empty() {
                    request = request.query(&[("q", keywords)]);
                }
                if let Some(category) = &query.category {
                    request = request.query(&[("category", category.as_str())]);
                }
                if let Some(token) = &self.config.access_token {
                    request = request.bearer_auth(token);
                }
                fetch_text(request)
            })
            .await?;

        let response: SearchResponse = serde_json::from_str(&body)?;
        Ok(map_results(
            response.results,
            limit,
            self.highlight_ratio,
            &self.ctx.price_fallback,
        ))
    }
}

#[async_trait]
impl SourceAdapter for MarketplaceAdapter {
    fn source(&self) -> Source {
        Source::Marketplace
    }

    async fn fetch(&self, query: &SlotQuery, limit: usize) -> FetchOutcome {
        FetchOutcome::from_result(self.try_fetch(query, limit).await)
    }
}

/// Map a candidate batch to offers. The highlight baseline covers the whole
/// batch, not just the kept prefix.
fn map_results(
    items: Vec<SearchItem>,
    limit: usize,
    highlight_ratio: f64,
    price_fallback: &str,
) -> Vec<Offer> {
    let prices: Vec<Option<f64>> = items.iter().map(|item| item.price).collect();
    let flags = highlight_flags(&prices, highlight_ratio);
    let mut seen = HashSet::new();

    items
        .into_iter()
        .zip(flags)
        .filter_map(|(item, highlighted)| {
            let title = item.title?;
            let link = item.permalink?;
            if !seen.insert(link.clone()) {
                return None;
            }

            let price = item.price.map(|p| format!("{p:.2}"));
            let image = item.thumbnail.as_deref().map(upgrade_to_https);
            let offer = Offer::new(
                Source::Marketplace,
                &title,
                &link,
                price.as_deref(),
                price_fallback,
            );
            if offer.is_none() {
                log::debug!("marketplace: skipping item without title or link");
            }
            offer.map(|o| o.with_image(image.as_deref()).with_highlight(highlighted))
        })
        .take(limit)
        .collect()
}
