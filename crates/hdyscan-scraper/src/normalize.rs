//! Price normalization.
//!
//! Every price leaving this module is bare numeric text (`299`, `1299.5`):
//! digits with at most one fractional part, no currency symbol and no
//! thousands separators. The currency prefix is added only for display.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("valid regex"));

static BODY_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"¥\s*([\d,]+\.?\d*)").expect("valid regex"));

/// Whether `text` is a bare number once thousands separators are dropped.
#[must_use]
pub fn is_bare_number(text: &str) -> bool {
    BARE_NUMBER.is_match(&text.replace(',', ""))
}

/// Normalizes the primary price widget.
///
/// When the widget text is not already a bare number, the positioning text
/// (currency or unit prefix) is prepended before every character other than
/// digits and `.` is stripped. Returns `None` when nothing numeric survives.
#[must_use]
pub fn normalize_price(widget_text: &str, positioning_text: Option<&str>) -> Option<String> {
    let widget = widget_text.trim();
    let combined = if is_bare_number(widget) {
        widget.to_owned()
    } else {
        format!("{}{widget}", positioning_text.map_or("", str::trim))
    };

    let cleaned: String = combined
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let cleaned = cleaned.trim_end_matches('.');
    BARE_NUMBER.is_match(cleaned).then(|| cleaned.to_owned())
}

/// Scans page text for the first currency-prefixed amount.
#[must_use]
pub fn price_from_body(body_text: &str) -> Option<String> {
    BODY_PRICE.captures_iter(body_text).find_map(|caps| {
        let amount = caps[1].replace(',', "");
        let amount = amount.trim_end_matches('.');
        BARE_NUMBER.is_match(amount).then(|| amount.to_owned())
    })
}

/// Resolves a page's price: the widget first, then the body text.
#[must_use]
pub fn resolve_price(
    widget_text: Option<&str>,
    positioning_text: Option<&str>,
    body_text: &str,
) -> Option<String> {
    widget_text
        .and_then(|widget| normalize_price(widget, positioning_text))
        .or_else(|| price_from_body(body_text))
}

/// Whether a normalized price is at or above `threshold`.
///
/// Unparseable input is never high.
#[must_use]
pub fn is_high_price(price: &str, threshold: u64) -> bool {
    Decimal::from_str(price).is_ok_and(|value| value >= Decimal::from(threshold))
}
