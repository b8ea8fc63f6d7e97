//! Field extraction for pages already classified as valid products.

use std::future::Future;

use hdyscan_core::{BillingCycle, ExtractedFields, PageSnapshot};

use crate::error::ScraperError;
use crate::normalize::{is_high_price, resolve_price};

/// Extracts title, price, and billing cycle from `snapshot`.
///
/// When the page offers an annual billing option, `render_switch` is called
/// once to select it and re-capture the page; the price is then read from the
/// switched page and the cycle recorded as annual. A failed switch is logged
/// and extraction continues from the original page under the default cycle.
/// The title always comes from the original page.
pub async fn extract<F, Fut>(
    snapshot: &PageSnapshot,
    high_price_threshold: u64,
    render_switch: F,
) -> ExtractedFields
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<PageSnapshot, ScraperError>>,
{
    if !snapshot.billing_cycle_radio_present {
        return extract_fields(snapshot, BillingCycle::Default, high_price_threshold);
    }

    match render_switch().await {
        Ok(switched) => ExtractedFields {
            title: product_title(snapshot),
            ..extract_fields(&switched, BillingCycle::Annually, high_price_threshold)
        },
        Err(e) => {
            tracing::warn!(error = %e, "annual billing switch failed; using default cycle");
            extract_fields(snapshot, BillingCycle::Default, high_price_threshold)
        }
    }
}

/// Reads fields from one snapshot without any re-rendering.
#[must_use]
pub fn extract_fields(
    snapshot: &PageSnapshot,
    billing_cycle: BillingCycle,
    high_price_threshold: u64,
) -> ExtractedFields {
    let price = resolve_price(
        snapshot.price_widget_text.as_deref(),
        snapshot.price_positioning_text.as_deref(),
        &snapshot.body_text,
    );

    if let Some(price) = price.as_deref() {
        if is_high_price(price, high_price_threshold) {
            tracing::warn!(price, threshold = high_price_threshold, "high price detected; keeping");
        }
    }

    ExtractedFields {
        title: product_title(snapshot),
        price,
        billing_cycle,
    }
}

fn product_title(snapshot: &PageSnapshot) -> String {
    snapshot
        .product_title_text
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_owned()
}
