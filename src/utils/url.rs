// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Resolve a potentially relative URL against a base URL.
///
/// The fragment is dropped so two links to the same listing compare equal.
///
/// # Examples
/// ```
/// use dealrelay::utils::url::resolve_url;
///
/// let base = url::Url::parse("https://shop.example/s?k=tv").unwrap();
/// assert_eq!(
///     resolve_url(&base, "/dp/B0TV#reviews").as_deref(),
///     Some("https://shop.example/dp/B0TV")
/// );
/// ```
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href == "#" {
        return None;
    }
    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

/// Rewrite plain `http://` links to `https://`.
pub fn upgrade_to_https(link: &str) -> String {
    match link.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => link.to_string(),
    }
}

/// Extract the host from a URL string.
pub fn get_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = Url::parse("https://shop.example/s?k=phone").unwrap();
        assert_eq!(
            resolve_url(&base, "/dp/B01").as_deref(),
            Some("https://shop.example/dp/B01")
        );
        assert_eq!(
            resolve_url(&base, "https://other.example/x").as_deref(),
            Some("https://other.example/x")
        );
    }

    #[test]
    fn test_resolve_rejects_non_links() {
        let base = Url::parse("https://shop.example/").unwrap();
        assert_eq!(resolve_url(&base, ""), None);
        assert_eq!(resolve_url(&base, "#"), None);
        assert_eq!(resolve_url(&base, "javascript:void(0)"), None);
    }

    #[test]
    fn test_upgrade_to_https() {
        assert_eq!(
            upgrade_to_https("http://img.example/a.jpg"),
            "https://img.example/a.jpg"
        );
        assert_eq!(
            upgrade_to_https("https://img.example/a.jpg"),
            "https://img.example/a.jpg"
        );
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://Shop.Example/path"),
            Some("shop.example".to_string())
        );
        assert_eq!(get_domain("invalid-url"), None);
    }
}
