//! Page classification: not-found, valid product, or neither.

use hdyscan_core::{PageSnapshot, Verdict};

/// Title token the catalog uses on its error page.
pub const NOT_FOUND_TITLE_MARKER: &str = "404";

/// Body phrase of the catalog's "page not found" notice.
pub const NOT_FOUND_BODY_PHRASE: &str = "抱歉找不到页面";

/// Classifies one rendered page.
///
/// 1. A not-found marker in the title or body wins over every other signal.
/// 2. A page with no product signal at all (heading, OS card, config area)
///    is [`Verdict::Invalid`].
/// 3. Otherwise the page is a [`Verdict::ValidProduct`]: a non-blank buy
///    button confirms it, and pages with product signals but no confirmed
///    buy button are still accepted.
#[must_use]
pub fn classify(snapshot: &PageSnapshot) -> Verdict {
    if snapshot.title.contains(NOT_FOUND_TITLE_MARKER)
        || snapshot.body_text.contains(NOT_FOUND_BODY_PHRASE)
    {
        return Verdict::NotFound;
    }

    let has_heading = snapshot.product_title_text.is_some();
    let has_product_info = has_heading || snapshot.has_os_card || snapshot.has_config_area;
    if !has_product_info {
        return Verdict::Invalid;
    }

    let has_buy_button = snapshot
        .buy_button_text
        .as_deref()
        .is_some_and(|text| !text.trim().is_empty());

    if has_buy_button && (has_heading || snapshot.has_os_card) {
        tracing::trace!("valid: heading or OS card with buy button");
    } else if has_buy_button && snapshot.has_config_area {
        tracing::trace!("valid: config area with buy button");
    } else {
        tracing::debug!(
            menu_items = snapshot.menu_item_count,
            "accepting product page without a confirmed buy button"
        );
    }
    Verdict::ValidProduct
}
