//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::{SlotConfig, Source};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Adapter retry behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// Caps, highlight threshold and fan-out
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Scheduler interval
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Message rendering and pacing
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Telegram Bot API settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Per-source endpoints and credentials
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Slots processed every cycle, in order
    #[serde(default = "defaults::slots")]
    pub slots: Vec<SlotConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Overlay credentials and destinations from environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(list) = get("DEALRELAY_DESTINATIONS") {
            self.dispatch.destinations = list
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(token) = get("MARKETPLACE_ACCESS_TOKEN") {
            self.sources.marketplace.access_token = Some(token);
        }
        if let Some(app_id) = get("AFFILIATE_APP_ID") {
            self.sources.affiliate.app_id = Some(app_id);
        }
        if let Some(secret) = get("AFFILIATE_SECRET") {
            self.sources.affiliate.secret = Some(secret);
        }
        if let Some(id) = get("PARTNER_ID") {
            self.sources.partner.partner_id = Some(id);
        }
        if let Some(key) = get("PARTNER_KEY") {
            self.sources.partner.partner_key = Some(key);
        }
        if let Some(shop) = get("PARTNER_SHOP_ID") {
            self.sources.partner.shop_id = Some(shop);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.retry.attempts == 0 {
            return Err(AppError::validation("retry.attempts must be > 0"));
        }
        if !(self.policy.highlight_ratio > 0.0 && self.policy.highlight_ratio <= 1.0) {
            return Err(AppError::validation(
                "policy.highlight_ratio must be in (0, 1]",
            ));
        }
        if self.policy.per_slot_cap == 0 {
            return Err(AppError::validation("policy.per_slot_cap must be > 0"));
        }
        if self.policy.max_concurrent == 0 {
            return Err(AppError::validation("policy.max_concurrent must be > 0"));
        }
        if self.schedule.interval_secs == 0 {
            return Err(AppError::validation("schedule.interval_secs must be > 0"));
        }
        if self.dispatch.decimal_separator == self.dispatch.thousands_separator {
            return Err(AppError::validation(
                "dispatch.decimal_separator and dispatch.thousands_separator must differ",
            ));
        }
        if self.slots.is_empty() {
            return Err(AppError::validation("No slots defined"));
        }
        for slot in &self.slots {
            if slot.name.trim().is_empty() {
                return Err(AppError::validation("slot with empty name"));
            }
            if slot.sources.is_empty() {
                return Err(AppError::validation(format!(
                    "slot '{}' has no sources",
                    slot.name
                )));
            }
            if slot.cap == Some(0) {
                return Err(AppError::validation(format!(
                    "slot '{}' has cap 0",
                    slot.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a slot by name.
    pub fn slot(&self, name: &str) -> Option<&SlotConfig> {
        self.slots.iter().find(|s| s.name == name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
            policy: PolicyConfig::default(),
            schedule: ScheduleConfig::default(),
            dispatch: DispatchConfig::default(),
            telegram: TelegramConfig::default(),
            sources: SourcesConfig::default(),
            slots: defaults::slots(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header sent to storefronts
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Retry settings applied inside each adapter call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "defaults::attempts")]
    pub attempts: u32,

    /// Sleep before attempt `n + 1` is `base_delay_ms * n`
    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: defaults::attempts(),
            base_delay_ms: defaults::base_delay(),
        }
    }
}

/// Aggregation policy values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Highlight when `price <= mean * highlight_ratio`
    #[serde(default = "defaults::highlight_ratio")]
    pub highlight_ratio: f64,

    /// Default maximum offers per slot
    #[serde(default = "defaults::per_slot_cap")]
    pub per_slot_cap: usize,

    /// Optional global cap across all slots of a cycle
    #[serde(default)]
    pub max_offers_per_cycle: Option<usize>,

    /// Candidate batch size used to compute the marketplace price baseline
    #[serde(default = "defaults::candidate_pool")]
    pub candidate_pool: usize,

    /// Maximum slots fetched concurrently
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            highlight_ratio: defaults::highlight_ratio(),
            per_slot_cap: defaults::per_slot_cap(),
            max_offers_per_cycle: None,
            candidate_pool: defaults::candidate_pool(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
        }
    }
}

/// Message rendering and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Chat ids posted to at start-up
    #[serde(default)]
    pub destinations: Vec<String>,

    /// Minimum gap between two sends to the same destination
    #[serde(default = "defaults::min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "defaults::currency_symbol")]
    pub currency_symbol: String,

    #[serde(default = "defaults::thousands_separator")]
    pub thousands_separator: char,

    #[serde(default = "defaults::decimal_separator")]
    pub decimal_separator: char,

    /// Shown when a source has no usable price
    #[serde(default = "defaults::price_fallback")]
    pub price_fallback: String,

    /// Caption prefix for highlighted offers
    #[serde(default = "defaults::highlight_label")]
    pub highlight_label: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            destinations: Vec::new(),
            min_delay_ms: defaults::min_delay(),
            currency_symbol: defaults::currency_symbol(),
            thousands_separator: defaults::thousands_separator(),
            decimal_separator: defaults::decimal_separator(),
            price_fallback: defaults::price_fallback(),
            highlight_label: defaults::highlight_label(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default = "defaults::telegram_api")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: defaults::telegram_api(),
        }
    }
}

/// Endpoints and credentials for every source.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    #[serde(default)]
    pub storefront: StorefrontConfig,
    #[serde(default)]
    pub affiliate: AffiliateConfig,
    #[serde(default)]
    pub partner: PartnerConfig,
}

/// Marketplace search API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    #[serde(default = "defaults::marketplace_base")]
    pub base_url: String,

    #[serde(default = "defaults::marketplace_site")]
    pub site_id: String,

    /// Optional bearer token
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::marketplace_base(),
            site_id: defaults::marketplace_site(),
            access_token: None,
        }
    }
}

/// HTML storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontConfig {
    #[serde(default = "defaults::storefront_base")]
    pub base_url: String,

    /// Search path used when a slot has no `path`
    #[serde(default = "defaults::storefront_search_path")]
    pub search_path: String,

    /// Lowercase substrings identifying a block or captcha page
    #[serde(default = "defaults::block_markers")]
    pub block_markers: Vec<String>,

    #[serde(default)]
    pub selectors: StorefrontSelectors,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::storefront_base(),
            search_path: defaults::storefront_search_path(),
            block_markers: defaults::block_markers(),
            selectors: StorefrontSelectors::default(),
        }
    }
}

/// CSS selectors for scraping a storefront result page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontSelectors {
    /// Selector for each result card
    pub row_selector: String,

    /// Selector for the title element within a card
    pub title_selector: String,

    /// Selector for the product link within a card
    pub link_selector: String,

    /// Selector for a fully rendered price (preferred)
    pub price_selector: String,

    /// Selector for the integer part of a split price
    pub price_whole_selector: String,

    /// Selector for the fractional part of a split price
    pub price_fraction_selector: String,

    /// Selector for the product image
    pub image_selector: String,
}

impl Default for StorefrontSelectors {
    fn default() -> Self {
        Self {
            row_selector: r#"div[data-component-type="s-search-result"]"#.to_string(),
            title_selector: "h2".to_string(),
            link_selector: "h2 a, a.a-link-normal".to_string(),
            price_selector: "span.a-price span.a-offscreen".to_string(),
            price_whole_selector: "span.a-price-whole".to_string(),
            price_fraction_selector: "span.a-price-fraction".to_string(),
            image_selector: "img.s-image".to_string(),
        }
    }
}

/// Affiliate GraphQL API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffiliateConfig {
    #[serde(default = "defaults::affiliate_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub app_id: Option<String>,

    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for AffiliateConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::affiliate_endpoint(),
            app_id: None,
            secret: None,
        }
    }
}

/// Partner-signed commerce API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerConfig {
    #[serde(default = "defaults::partner_base")]
    pub base_url: String,

    #[serde(default = "defaults::partner_path")]
    pub path: String,

    /// Public product page prefix used when an item has no url
    #[serde(default = "defaults::partner_product_base")]
    pub product_base_url: String,

    #[serde(default)]
    pub partner_id: Option<String>,

    #[serde(default)]
    pub partner_key: Option<String>,

    #[serde(default)]
    pub shop_id: Option<String>,
}

impl Default for PartnerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::partner_base(),
            path: defaults::partner_path(),
            product_base_url: defaults::partner_product_base(),
            partner_id: None,
            partner_key: None,
            shop_id: None,
        }
    }
}

mod defaults {
    use super::{SlotConfig, Source};
    use crate::models::{SlotMode, SlotQuery};

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".into()
    }
    pub fn accept_language() -> String {
        "pt-BR,pt;q=0.9,en;q=0.8".into()
    }
    pub fn timeout() -> u64 {
        20
    }

    // Retry defaults
    pub fn attempts() -> u32 {
        3
    }
    pub fn base_delay() -> u64 {
        1000
    }

    // Policy defaults
    pub fn highlight_ratio() -> f64 {
        0.8
    }
    pub fn per_slot_cap() -> usize {
        5
    }
    pub fn candidate_pool() -> usize {
        50
    }
    pub fn max_concurrent() -> usize {
        4
    }

    // Schedule defaults
    pub fn interval() -> u64 {
        300
    }

    // Dispatch defaults
    pub fn min_delay() -> u64 {
        1000
    }
    pub fn currency_symbol() -> String {
        "R$".into()
    }
    pub fn thousands_separator() -> char {
        '.'
    }
    pub fn decimal_separator() -> char {
        ','
    }
    pub fn price_fallback() -> String {
        "Ver preço no site".into()
    }
    pub fn highlight_label() -> String {
        "🔥 OFERTA".into()
    }
    pub fn telegram_api() -> String {
        "https://api.telegram.org".into()
    }

    // Source defaults
    pub fn marketplace_base() -> String {
        "https://api.mercadolibre.com".into()
    }
    pub fn marketplace_site() -> String {
        "MLB".into()
    }
    pub fn storefront_base() -> String {
        "https://www.amazon.com.br".into()
    }
    pub fn storefront_search_path() -> String {
        "/s".into()
    }
    pub fn block_markers() -> Vec<String> {
        vec![
            "captcha".into(),
            "robot check".into(),
            "/errors/validatecaptcha".into(),
            "api-services-support@amazon.com".into(),
            "sorry, we just need to make sure you're not a robot".into(),
        ]
    }
    pub fn affiliate_endpoint() -> String {
        "https://open-api.affiliate.shopee.com.br/graphql".into()
    }
    pub fn partner_base() -> String {
        "https://partner.shopeemobile.com".into()
    }
    pub fn partner_path() -> String {
        "/api/v2/product/search_item".into()
    }
    pub fn partner_product_base() -> String {
        "https://shopee.com.br/product".into()
    }

    // Slot defaults
    pub fn slots() -> Vec<SlotConfig> {
        vec![
            SlotConfig {
                name: "eletronicos".to_string(),
                sources: vec![Source::Marketplace, Source::Storefront],
                mode: SlotMode::Merge,
                cap: Some(5),
                query: SlotQuery {
                    keywords: "smartphone".to_string(),
                    category: Some("MLB1051".to_string()),
                    path: None,
                },
                empty_notice: None,
            },
            SlotConfig {
                name: "achadinhos".to_string(),
                sources: vec![Source::Affiliate, Source::Partner, Source::Storefront],
                mode: SlotMode::Fallback,
                cap: Some(4),
                query: SlotQuery {
                    keywords: "fone bluetooth".to_string(),
                    category: None,
                    path: None,
                },
                empty_notice: None,
            },
        ]
    }
}
