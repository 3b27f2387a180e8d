// src/utils/price.rs

//! Price parsing and locale-aware rendering.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::DispatchConfig;

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d[\d.,]*").expect("static regex"))
}

/// Combine separately rendered price fragments into one decimal string.
///
/// `whole` may carry separators or a trailing decimal mark (`"1.234,"`);
/// only its digits are kept. A missing or blank fraction becomes `"00"`.
///
/// ```
/// use dealrelay::utils::price::combine_fragments;
///
/// assert_eq!(combine_fragments("1.299,", Some("9")).as_deref(), Some("1299.90"));
/// assert_eq!(combine_fragments("49", None).as_deref(), Some("49.00"));
/// ```
pub fn combine_fragments(whole: &str, fraction: Option<&str>) -> Option<String> {
    let whole: String = whole.chars().filter(char::is_ascii_digit).collect();
    if whole.is_empty() {
        return None;
    }

    let mut fraction: String = fraction
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .take(2)
        .collect();
    while fraction.len() < 2 {
        fraction.push('0');
    }

    Some(format!("{whole}.{fraction}"))
}

/// Parse the first amount in `text`, whatever its separator convention.
///
/// When both `.` and `,` appear, the last one is the decimal mark. A lone
/// separator followed by exactly three digits is read as a thousands mark.
pub fn parse_amount(text: &str) -> Option<f64> {
    let raw = amount_pattern().find(text)?.as_str();
    let raw = raw.trim_end_matches(['.', ',']);

    let last_dot = raw.rfind('.');
    let last_comma = raw.rfind(',');

    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            let (decimal, thousands) = if dot > comma { ('.', ',') } else { (',', '.') };
            raw.replace(thousands, "").replace(decimal, ".")
        }
        (Some(_), None) => normalize_single(raw, '.'),
        (None, Some(_)) => normalize_single(raw, ','),
        (None, None) => raw.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn normalize_single(raw: &str, sep: char) -> String {
    let groups: Vec<&str> = raw.split(sep).collect();
    let is_thousands = groups.len() > 2 || groups.last().is_some_and(|g| g.len() == 3);
    if is_thousands {
        groups.concat()
    } else {
        raw.replace(sep, ".")
    }
}

/// Target locale for rendered prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyFormat {
    pub symbol: String,
    pub thousands_separator: char,
    pub decimal_separator: char,
}

impl CurrencyFormat {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            symbol: config.currency_symbol.clone(),
            thousands_separator: config.thousands_separator,
            decimal_separator: config.decimal_separator,
        }
    }

    /// Format an amount, e.g. `1234.5` as `R$ 1.234,50`.
    pub fn format_amount(&self, amount: f64) -> String {
        let cents = (amount * 100.0).round() as i64;
        let sign = if cents < 0 { "-" } else { "" };
        let cents = cents.unsigned_abs();
        let integer = (cents / 100).to_string();
        let fraction = cents % 100;

        let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
        for (i, digit) in integer.chars().enumerate() {
            if i > 0 && (integer.len() - i) % 3 == 0 {
                grouped.push(self.thousands_separator);
            }
            grouped.push(digit);
        }

        let amount = format!("{sign}{grouped}{}{fraction:02}", self.decimal_separator);
        if self.symbol.is_empty() {
            amount
        } else {
            format!("{} {amount}", self.symbol)
        }
    }

    /// Re-render a source price string in the target locale.
    ///
    /// Strings without a parsable amount (fallback sentinels) pass through.
    pub fn render(&self, display: &str) -> String {
        match parse_amount(display) {
            Some(amount) => self.format_amount(amount),
            None => display.to_string(),
        }
    }
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}
