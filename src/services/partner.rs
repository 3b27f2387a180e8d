// src/services/partner.rs

//! Partner-signed commerce API adapter.
//!
//! Requests are `POST {base}{path}?partner_id=..&timestamp=..&shop_id=..&sign=..`
//! with a JSON body. The signature covers the exact body bytes sent.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::error::FetchError;
use crate::models::{Offer, PartnerConfig, SlotQuery, Source};
use crate::utils::http::fetch_text;
use crate::utils::signing::partner_signature;

use super::{AdapterContext, FetchOutcome, SourceAdapter, require, require_keywords};

#[derive(Debug, Deserialize)]
struct PartnerResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    response: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    item: Vec<PartnerItem>,
}

#[derive(Debug, Deserialize)]
struct PartnerItem {
    #[serde(default)]
    item_id: Option<u64>,
    #[serde(default)]
    item_name: Option<String>,
    #[serde(default)]
    current_price: Option<f64>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    item_url: Option<String>,
}

pub struct PartnerAdapter {
    ctx: AdapterContext,
    config: PartnerConfig,
}

impl PartnerAdapter {
    pub fn new(ctx: AdapterContext, config: PartnerConfig) -> Self {
        Self { ctx, config }
    }

    async fn try_fetch(&self, query: &SlotQuery, limit: usize) -> Result<Vec<Offer>, FetchError> {
        let partner_id = require(&self.config.partner_id, "partner.partner_id")?;
        let partner_key = require(&self.config.partner_key, "partner.partner_key")?;
        let shop_id = require(&self.config.shop_id, "partner.shop_id")?;
        let keywords = require_keywords(query)?;

        let path = self.config.path.as_str();
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let body = serde_json::json!({
            "keyword": keywords,
            "page_size": limit,
            "offset": 0,
        })
        .to_string();

        let text = self
            .ctx
            .retry
            .run("partner", || {
                let timestamp = Utc::now().timestamp();
                let sign =
                    partner_signature(partner_key, partner_id, path, timestamp, shop_id, &body);
                let request = self
                    .ctx
                    .client
                    .post(&url)
                    .query(&[
                        ("partner_id", partner_id),
                        ("shop_id", shop_id),
                        ("sign", sign.as_str()),
                    ])
                    .query(&[("timestamp", timestamp)])
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone());
                fetch_text(request)
            })
            .await?;

        self.parse_response(&text, shop_id, limit)
    }

    fn parse_response(
        &self,
        body: &str,
        shop_id: &str,
        limit: usize,
    ) -> Result<Vec<Offer>, FetchError> {
        let response: PartnerResponse = serde_json::from_str(body)?;

        if !response.error.is_empty() {
            return Err(FetchError::Rejected(format!(
                "{}: {}",
                response.error, response.message
            )));
        }

        let items = response
            .response
            .ok_or_else(|| FetchError::UnexpectedSchema("missing response".into()))?
            .item;

        let mut seen = HashSet::new();
        let offers = items
            .into_iter()
            .filter_map(|item| {
                let title = item.item_name?;
                let link = item.item_url.filter(|u| !u.trim().is_empty()).or_else(|| {
                    item.item_id.map(|id| {
                        format!(
                            "{}/{}/{}",
                            self.config.product_base_url.trim_end_matches('/'),
                            shop_id,
                            id
                        )
                    })
                })?;
                if !seen.insert(link.clone()) {
                    return None;
                }
                let price = item.current_price.map(|p| format!("{p:.2}"));
                Offer::new(
                    Source::Partner,
                    &title,
                    &link,
                    price.as_deref(),
                    &self.ctx.price_fallback,
                )
                .map(|offer| offer.with_image(item.image_url.as_deref()))
            })
            .take(limit)
            .collect();

        Ok(offers)
    }
}

#[async_trait]
impl SourceAdapter for PartnerAdapter {
    fn source(&self) -> Source {
        Source::Partner
    }

    async fn fetch(&self, query: &SlotQuery, limit: usize) -> FetchOutcome {
        FetchOutcome::from_result(self.try_fetch(query, limit).await)
    }
}
