// src/services/storefront.rs

//! HTML storefront adapter.
//!
//! Fetches a search result page and scrapes result cards with configurable
//! CSS selectors. A page with no result cards is checked against known block
//! markers so a captcha wall is reported as `Blocked`, not as "no results".

use std::collections::HashSet;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, FetchError, Result};
use crate::models::{Offer, SlotQuery, Source, StorefrontConfig};
use crate::utils::http::fetch_text;
use crate::utils::price::combine_fragments;
use crate::utils::resolve_url;

use super::{AdapterContext, FetchOutcome, SourceAdapter};

/// Compiled selectors for a result page.
struct CardSelectors {
    row: Selector,
    title: Selector,
    link: Selector,
    price: Selector,
    price_whole: Selector,
    price_fraction: Selector,
    image: Selector,
}

pub struct StorefrontAdapter {
    ctx: AdapterContext,
    base_url: Url,
    search_path: String,
    block_markers: Vec<String>,
    selectors: CardSelectors,
}

impl StorefrontAdapter {
    /// Create the adapter, compiling every selector up front.
    pub fn new(ctx: AdapterContext, config: StorefrontConfig) -> Result<Self> {
        let sel = &config.selectors;
        let selectors = CardSelectors {
            row: Self::parse_selector(&sel.row_selector)?,
            title: Self::parse_selector(&sel.title_selector)?,
            link: Self::parse_selector(&sel.link_selector)?,
            price: Self::parse_selector(&sel.price_selector)?,
            price_whole: Self::parse_selector(&sel.price_whole_selector)?,
            price_fraction: Self::parse_selector(&sel.price_fraction_selector)?,
            image: Self::parse_selector(&sel.image_selector)?,
        };

        Ok(Self {
            ctx,
            base_url: Url::parse(&config.base_url)?,
            search_path: config.search_path,
            block_markers: config
                .block_markers
                .into_iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            selectors,
        })
    }

    async fn try_fetch(&self, query: &SlotQuery, limit: usize) -> std::result::Result<Vec<Offer>, FetchError> {
        let keywords = query.keywords.trim();
        if keywords.is_empty() && query.path.is_none() {
            return Err(FetchError::ConfigMissing("slot.keywords or slot.path"));
        }

        let path = query.path.as_deref().unwrap_or(&self.search_path);
        let page_url = self
            .base_url
            .join(path)
            .map_err(|e| FetchError::UnexpectedSchema(format!("bad storefront path {path}: {e}")))?;

        let body = self
            .ctx
            .retry
            .run("storefront", || {
                let mut request = self.ctx.client.get(page_url.clone());
                if !keywords.is_empty() {
                    request = request.query(&[("k", keywords)]);
                }
                fetch_text(request)
            })
            .await?;

        self.parse_listing(&body, &page_url, limit)
    }

    /// Scrape result cards, skipping incomplete cards and repeated links.
    fn parse_listing(
        &self,
        body: &str,
        page_url: &Url,
        limit: usize,
    ) -> std::result::Result<Vec<Offer>, FetchError> {
        let document = Html::parse_document(body);
        let mut rows = document.select(&self.selectors.row).peekable();

        if rows.peek().is_none() {
            if let Some(marker) = self.detect_block(body) {
                return Err(FetchError::Blocked(marker.to_string()));
            }
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut offers = Vec::new();

        for row in rows {
            if offers.len() >= limit {
                break;
            }
            let Some(offer) = self.parse_card(&row, page_url) else {
                log::debug!("storefront: skipping card without title or link");
                continue;
            };
            if !seen.insert(offer.url().to_string()) {
                log::debug!("storefront: duplicate link {}", offer.url());
                continue;
            }
            offers.push(offer);
        }

        Ok(offers)
    }

    fn parse_card(&self, row: &ElementRef, page_url: &Url) -> Option<Offer> {
        let sel = &self.selectors;

        let title_elem = row.select(&sel.title).next()?;
        let title: String = title_elem.text().collect::<Vec<_>>().join(" ");

        let href = row.select(&sel.link).next()?.value().attr("href")?;
        let link = resolve_url(page_url, href)?;

        let price = self.card_price(row);
        let image = row
            .select(&sel.image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| resolve_url(page_url, src));

        Offer::new(
            Source::Storefront,
            &title,
            &link,
            price.as_deref(),
            &self.ctx.price_fallback,
        )
        .map(|offer| offer.with_image(image.as_deref()))
    }

    /// Full rendered price when present, otherwise whole + fraction fragments.
    fn card_price(&self, row: &ElementRef) -> Option<String> {
        let sel = &self.selectors;

        let rendered = row
            .select(&sel.price)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|text| text.chars().any(|c| c.is_ascii_digit()));
        if rendered.is_some() {
            return rendered;
        }

        let whole: String = row.select(&sel.price_whole).next()?.text().collect();
        let fraction: Option<String> = row
            .select(&sel.price_fraction)
            .next()
            .map(|el| el.text().collect());
        combine_fragments(&whole, fraction.as_deref())
    }

    fn detect_block(&self, body: &str) -> Option<&str> {
        let lower = body.to_lowercase();
        self.block_markers
            .iter()
            .find(|marker| lower.contains(marker.as_str()))
            .map(String::as_str)
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

#[async_trait]
impl SourceAdapter for StorefrontAdapter {
    fn source(&self) -> Source {
        Source::Storefront
    }

    async fn fetch(&self, query: &SlotQuery, limit: usize) -> FetchOutcome {
        FetchOutcome::from_result(self.try_fetch(query, limit).await)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Client;

    use super::*;
    use crate::models::StorefrontSelectors;
    use crate::services::RetryPolicy;

    const RESULTS_PAGE: &str = r#"
        <html><body>
        <div data-component-type="s-search-result">
            <h2><a class="a-link-normal" href="/dp/B0001?ref=sr_1"><span>Echo Dot 5ª geração</span></a></h2>
            <span class="a-price"><span class="a-offscreen">R$ 379,05</span></span>
            <img class="s-image" src="https://m.media.test/echo.jpg">
        </div>
        <div data-component-type="s-search-result">
            <h2><a class="a-link-normal" href="/dp/B0002"><span>Kindle 11ª geração</span></a></h2>
            <span class="a-price"><span class="a-price-whole">1.299,</span><span class="a-price-fraction">9</span></span>
        </div>
        <div data-component-type="s-search-result">
            <h2><a class="a-link-normal" href="/dp/B0001?ref=sr_1#reviews"><span>Echo Dot 5ª geração (duplicado)</span></a></h2>
        </div>
        <div data-component-type="s-search-result">
            <span class="a-price"><span class="a-offscreen">R$ 10,00</span></span>
        </div>
        <div data-component-type="s-search-result">
            <h2><a class="a-link-normal" href="/dp/B0003"><span>Fire TV Stick</span></a></h2>
            <span class="a-price"><span class="a-price-whole">249</span></span>
        </div>
        </body></html>
    "#;

    const CAPTCHA_PAGE: &str = r#"
        <html><head><title>Amazon.com.br</title></head><body>
        <form action="/errors/validateCaptcha">
        <h4>Digite os caracteres que você vê abaixo</h4>
        <p>Sorry, we just need to make sure you're not a robot.</p>
        </form></body></html>
    "#;

    fn adapter() -> StorefrontAdapter {
        let ctx = AdapterContext {
            client: Client::new(),
            retry: RetryPolicy::none(),
            price_fallback: "Ver preço no site".into(),
        };
        StorefrontAdapter::new(ctx, StorefrontConfig::default()).unwrap()
    }

    fn page_url() -> Url {
        Url::parse("https://www.amazon.com.br/s?k=echo").unwrap()
    }

    #[test]
    fn test_parses_cards_and_prices() {
        let offers = adapter()
            .parse_listing(RESULTS_PAGE, &page_url(), 10)
            .unwrap();

        let titles: Vec<&str> = offers.iter().map(|o| o.title()).collect();
        assert_eq!(
            titles,
            vec!["Echo Dot 5ª geração", "Kindle 11ª geração", "Fire TV Stick"]
        );

        assert_eq!(offers[0].url(), "https://www.amazon.com.br/dp/B0001?ref=sr_1");
        assert_eq!(offers[0].price_display(), "R$ 379,05");
        assert_eq!(offers[0].image_url(), Some("https://m.media.test/echo.jpg"));
        assert_eq!(offers[1].price_display(), "1299.90");
        assert_eq!(offers[1].image_url(), None);
        assert_eq!(offers[2].price_display(), "249.00");
    }

    #[test]
    fn test_duplicate_links_dropped() {
        let offers = adapter()
            .parse_listing(RESULTS_PAGE, &page_url(), 10)
            .unwrap();
        let urls: HashSet<&str> = offers.iter().map(|o| o.url()).collect();
        assert_eq!(urls.len(), offers.len());
        assert!(offers.iter().all(|o| !o.title().contains("duplicado")));
    }

    #[test]
    fn test_limit_respected() {
        let offers = adapter().parse_listing(RESULTS_PAGE, &page_url(), 1).unwrap();
        assert_eq!(offers.len(), 1);
    }

    #[test]
    fn test_captcha_page_is_blocked() {
        let err = adapter()
            .parse_listing(CAPTCHA_PAGE, &page_url(), 5)
            .unwrap_err();
        assert!(matches!(err, FetchError::Blocked(_)));
    }

    #[test]
    fn test_empty_page_is_not_blocked() {
        let offers = adapter()
            .parse_listing("<html><body><p>Nenhum resultado</p></body></html>", &page_url(), 5)
            .unwrap();
        assert!(offers.is_empty());
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let config = StorefrontConfig {
            selectors: StorefrontSelectors {
                row_selector: "[[invalid".into(),
                ..StorefrontSelectors::default()
            },
            ..StorefrontConfig::default()
        };
        let ctx = AdapterContext {
            client: Client::new(),
            retry: RetryPolicy::none(),
            price_fallback: "-".into(),
        };
        assert!(matches!(
            StorefrontAdapter::new(ctx, config),
            Err(AppError::Selector { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_never_fails_on_network_error() {
        let ctx = AdapterContext {
            client: Client::new(),
            retry: RetryPolicy::none(),
            price_fallback: "-".into(),
        };
        let config = StorefrontConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..StorefrontConfig::default()
        };
        let adapter = StorefrontAdapter::new(ctx, config).unwrap();
        let query = SlotQuery {
            keywords: "echo".into(),
            ..SlotQuery::default()
        };

        let outcome = adapter.fetch(&query, 3).await;
        assert!(outcome.offers().is_empty());
        assert!(matches!(outcome, FetchOutcome::Failed(FetchError::Network(_))));
    }
}
