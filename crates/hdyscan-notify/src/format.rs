//! Markdown rendering of change deltas.

use hdyscan_core::{Delta, DeltaKind};

const NO_PRICE: &str = "n/a";

/// Renders a notifiable delta; `Unchanged` renders nothing.
#[must_use]
pub fn format_delta(delta: &Delta) -> Option<String> {
    let record = &delta.record;
    let price = record.price.as_deref().unwrap_or(NO_PRICE);
    let title = if record.title.is_empty() {
        "(untitled)"
    } else {
        record.title.as_str()
    };

    let (heading, price_line) = match delta.kind {
        DeltaKind::New => ("New product", format!("> Price: **{price}**")),
        DeltaKind::PriceChanged => (
            "Price changed",
            format!(
                "> Price: {} → **{price}**",
                delta.previous_price.as_deref().unwrap_or(NO_PRICE)
            ),
        ),
        DeltaKind::Unchanged => return None,
    };

    Some(format!(
        "### {heading}\n**{title}**\n> PID: {pid}\n{price_line}\n> Billing: {cycle}\n[Open product page]({url})",
        pid = record.pid,
        cycle = record.billing_cycle,
        url = record.source_url,
    ))
}
