// src/models/offer.rs

//! Normalized offer produced by every source adapter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Marketplace or API an offer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Public marketplace search API
    Marketplace,
    /// HTML-scraped storefront search page
    Storefront,
    /// Affiliate GraphQL API
    Affiliate,
    /// Partner-signed commerce API
    Partner,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::Marketplace,
        Source::Storefront,
        Source::Affiliate,
        Source::Partner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Marketplace => "marketplace",
            Source::Storefront => "storefront",
            Source::Affiliate => "affiliate",
            Source::Partner => "partner",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One product listing ready for display.
///
/// Fields are private so an emitted offer cannot be mutated downstream; the
/// only ways in are [`Offer::new`] and the consuming `with_*` methods an
/// adapter calls before handing the offer over.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Offer {
    source: Source,
    title: String,
    price_display: String,
    url: String,
    image_url: Option<String>,
    is_highlighted: bool,
}

impl Offer {
    /// Build an offer, or `None` when title or url is blank.
    ///
    /// A blank `price_display` is replaced by `price_fallback`.
    pub fn new(
        source: Source,
        title: &str,
        url: &str,
        price_display: Option<&str>,
        price_fallback: &str,
    ) -> Option<Self> {
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        let url = url.trim();
        if title.is_empty() || url.is_empty() {
            return None;
        }

        let price_display = price_display
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(price_fallback);
        let price_display = if price_display.trim().is_empty() {
            "?".to_string()
        } else {
            price_display.to_string()
        };

        Some(Self {
            source,
            title,
            price_display,
            url: url.to_string(),
            image_url: None,
            is_highlighted: false,
        })
    }

    /// Attach an image; blank urls are ignored.
    pub fn with_image(mut self, image_url: Option<&str>) -> Self {
        self.image_url = image_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_highlight(mut self, highlighted: bool) -> Self {
        self.is_highlighted = highlighted;
        self
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price_display(&self) -> &str {
        &self.price_display
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn is_highlighted(&self) -> bool {
        self.is_highlighted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_title_or_url() {
        assert!(Offer::new(Source::Storefront, "  ", "https://x.test/1", None, "n/a").is_none());
        assert!(Offer::new(Source::Storefront, "Phone", " ", None, "n/a").is_none());
    }

    #[test]
    fn test_price_falls_back_to_sentinel() {
        let offer = Offer::new(Source::Partner, "Phone", "https://x.test/1", Some(" "), "see price")
            .unwrap();
        assert_eq!(offer.price_display(), "see price");

        let offer = Offer::new(Source::Partner, "Phone", "https://x.test/1", None, "").unwrap();
        assert!(!offer.price_display().is_empty());
    }

    #[test]
    fn test_title_whitespace_is_collapsed() {
        let offer = Offer::new(
            Source::Marketplace,
            "  Smart\n   TV  50\" ",
            "https://x.test/tv",
            Some("1999.90"),
            "n/a",
        )
        .unwrap()
        .with_image(Some(""));
        assert_eq!(offer.title(), "Smart TV 50\"");
        assert_eq!(offer.image_url(), None);
        assert!(!offer.is_highlighted());
    }

    #[test]
    fn test_source_serializes_snake_case() {
        let json = serde_json::to_string(&Source::Marketplace).unwrap();
        assert_eq!(json, "\"marketplace\"");
        let parsed: Source = serde_json::from_str("\"partner\"").unwrap();
        assert_eq!(parsed, Source::Partner);
    }
}
