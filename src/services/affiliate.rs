// src/services/affiliate.rs

//! Affiliate GraphQL API adapter.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::models::{AffiliateConfig, Offer, SlotQuery, Source};
use crate::utils::http::fetch_text;
use crate::utils::signing::affiliate_signature;

use super::{AdapterContext, FetchOutcome, SourceAdapter, require, require_keywords};

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<GraphqlData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    #[serde(rename = "productOfferV2", default)]
    product_offer: Option<ProductOfferConnection>,
}

#[derive(Debug, Deserialize)]
struct ProductOfferConnection {
    #[serde(default)]
    nodes: Vec<ProductNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductNode {
    #[serde(default)]
    product_name: Option<String>,
    /// Sent as a string by the API, accepted as a number too
    #[serde(default)]
    price_min: Option<Value>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    offer_link: Option<String>,
    #[serde(default)]
    product_link: Option<String>,
}

pub struct AffiliateAdapter {
    ctx: AdapterContext,
    config: AffiliateConfig,
}

impl AffiliateAdapter {
    pub fn new(ctx: AdapterContext, config: AffiliateConfig) -> Self {
        Self { ctx, config }
    }

    async fn try_fetch(&self, query: &SlotQuery, limit: usize) -> Result<Vec<Offer>, FetchError> {
        let app_id = require(&self.config.app_id, "affiliate.app_id")?;
        let secret = require(&self.config.secret, "affiliate.secret")?;
        let keywords = require_keywords(query)?;

        let payload = build_payload(keywords, limit);

        let body = self
            .ctx
            .retry
            .run("affiliate", || {
                // Signed and sent timestamp must match, so it is taken per attempt.
                let timestamp = Utc::now().timestamp();
                let signature = affiliate_signature(app_id, timestamp, &payload, secret);
                let request = self
                    .ctx
                    .client
                    .post(&self.config.endpoint)
                    .header(CONTENT_TYPE, "application/json")
                    .header(AUTHORIZATION, authorization_header(app_id, timestamp, &signature))
                    .body(payload.clone());
                fetch_text(request)
            })
            .await?;

        parse_response(&body, limit, &self.ctx.price_fallback)
    }
}

#[async_trait]
impl SourceAdapter for AffiliateAdapter {
    fn source(&self) -> Source {
        Source::Affiliate
    }

    async fn fetch(&self, query: &SlotQuery, limit: usize) -> FetchOutcome {
        FetchOutcome::from_result(self.try_fetch(query, limit).await)
    }
}

fn authorization_header(app_id: &str, timestamp: i64, signature: &str) -> String {
    format!("SHA256 Credential={app_id}, Timestamp={timestamp}, Signature={signature}")
}

/// GraphQL request body. Keywords are embedded as a JSON string literal,
/// which is also a valid GraphQL string literal.
fn build_payload(keywords: &str, limit: usize) -> String {
    let query = format!(
        "{{productOfferV2(keyword: {}, limit: {}, sortType: 2) {{ nodes {{ productName priceMin imageUrl offerLink productLink }} }} }}",
        Value::String(keywords.to_string()),
        limit
    );
    serde_json::json!({ "query": query }).to_string()
}

fn parse_response(
    body: &str,
    limit: usize,
    price_fallback: &str,
) -> Result<Vec<Offer>, FetchError> {
    let response: GraphqlResponse = serde_json::from_str(body)?;

    if !response.errors.is_empty() {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(FetchError::Rejected(messages.join("; ")));
    }

    let nodes = response
        .data
        .and_then(|d| d.product_offer)
        .ok_or_else(|| FetchError::UnexpectedSchema("missing data.productOfferV2".into()))?
        .nodes;

    let mut seen = HashSet::new();
    let offers = nodes
        .into_iter()
        .filter_map(|node| {
            let title = node.product_name?;
            let link = node.offer_link.or(node.product_link)?;
            if !seen.insert(link.clone()) {
                return None;
            }
            let price = node.price_min.as_ref().and_then(price_text);
            Offer::new(
                Source::Affiliate,
                &title,
                &link,
                price.as_deref(),
                price_fallback,
            )
            .map(|offer| offer.with_image(node.image_url.as_deref()))
        })
        .take(limit)
        .collect();

    Ok(offers)
}

fn price_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_f64().map(|v| format!("{v:.2}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Client;

    use super::*;
    use crate::services::RetryPolicy;

    #[test]
    fn test_payload_escapes_keywords() {
        let payload = build_payload(r#"fone "pro""#, 5);
        let parsed: Value = serde_json::from_str(&payload).unwrap();
        let query = parsed["query"].as_str().unwrap();
        assert!(query.contains(r#"keyword: "fone \"pro\"""#));
        assert!(query.contains("limit: 5"));
    }

    #[test]
    fn test_authorization_header_format() {
        assert_eq!(
            authorization_header("1000", 1_700_000_000, "abc"),
            "SHA256 Credential=1000, Timestamp=1700000000, Signature=abc"
        );
    }

    #[test]
    fn test_parse_nodes() {
        let body = r#"{"data":{"productOfferV2":{"nodes":[
            {"productName":"Fone TWS","priceMin":"39.9","imageUrl":"https://cf.test/a.jpg","offerLink":"https://s.test/abc"},
            {"productName":"Cabo USB-C","priceMin":12.5,"productLink":"https://shop.test/p/2"},
            {"productName":"Sem link","priceMin":"1.0"},
            {"productName":"Capinha","offerLink":"https://s.test/def"}
        ]}}}"#;

        let offers = parse_response(body, 10, "see price").unwrap();
        assert_eq!(offers.len(), 3);
        assert_eq!(offers[0].price_display(), "39.9");
        assert_eq!(offers[0].image_url(), Some("https://cf.test/a.jpg"));
        assert_eq!(offers[1].url(), "https://shop.test/p/2");
        assert_eq!(offers[1].price_display(), "12.50");
        assert_eq!(offers[2].price_display(), "see price");
    }

    #[test]
    fn test_repeated_links_emitted_once() {
        let body = r#"{"data":{"productOfferV2":{"nodes":[
            {"productName":"Fone TWS","priceMin":"39.9","offerLink":"https://s.test/x"},
            {"productName":"Fone TWS Pro","priceMin":"49.9","offerLink":"https://s.test/x"},
            {"productName":"Cabo","priceMin":"9.9","offerLink":"https://s.test/y"}
        ]}}}"#;

        let offers = parse_response(body, 2, "-").unwrap();
        let urls: Vec<&str> = offers.iter().map(|o| o.url()).collect();
        assert_eq!(urls, vec!["https://s.test/x", "https://s.test/y"]);
        assert_eq!(offers[0].title(), "Fone TWS");
    }

    #[test]
    fn test_graphql_errors_are_rejected() {
        let body = r#"{"errors":[{"message":"Invalid Signature"}],"data":null}"#;
        let err = parse_response(body, 5, "-").unwrap_err();
        assert_eq!(err, FetchError::Rejected("Invalid Signature".into()));
    }

    #[test]
    fn test_malformed_payload_is_schema_error() {
        assert!(matches!(
            parse_response("<html>", 5, "-"),
            Err(FetchError::UnexpectedSchema(_))
        ));
        assert!(matches!(
            parse_response(r#"{"data":{}}"#, 5, "-"),
            Err(FetchError::UnexpectedSchema(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_credentials_short_circuit() {
        let ctx = AdapterContext {
            client: Client::new(),
            retry: RetryPolicy::none(),
            price_fallback: "-".into(),
        };
        let config = AffiliateConfig {
            endpoint: "http://127.0.0.1:9/graphql".into(),
            app_id: Some("1000".into()),
            secret: None,
        };
        let adapter = AffiliateAdapter::new(ctx, config);
        let query = SlotQuery {
            keywords: "fone".into(),
            ..SlotQuery::default()
        };

        assert_eq!(
            adapter.fetch(&query, 5).await,
            FetchOutcome::Failed(FetchError::ConfigMissing("affiliate.secret"))
        );
    }
}
