//! Utility functions and helpers.

pub mod http;
pub mod price;
pub mod signing;
pub mod url;

pub use self::url::{get_domain, resolve_url, upgrade_to_https};

use unicode_segmentation::UnicodeSegmentation;

/// Truncate to at most `max_chars` characters on a grapheme boundary,
/// appending an ellipsis when anything was cut.
pub fn truncate_graphemes(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let budget = max_chars.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let len = grapheme.chars().count();
        if used + len > budget {
            break;
        }
        out.push_str(grapheme);
        used += len;
    }
    out.push('…');
    out
}
