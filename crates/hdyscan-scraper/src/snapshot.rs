//! Catalog selectors and [`PageSnapshot`] capture.

use hdyscan_core::PageSnapshot;

use crate::render::Page;

pub const PRODUCT_TITLE: &str = ".allocation-header-title h1";
pub const MAINTENANCE_TITLE: &str = ".maintain-text-title";
pub const OS_CARD: &str = ".os-card";
pub const CONFIG_AREA: &str = ".configureproduct";
pub const BUY_BUTTON: &str = ".btn-buyNow";
pub const ANNUAL_BILLING_RADIO: &str = r#"input[name="billingcycle"][value="annually"]"#;
pub const MENU_ITEM: &str = ".sky-cart-menu-item";
pub const PRICE_WIDGET: &str = ".ordersummarybottom-price";
pub const PRICE_POSITIONING: &str = ".pricePositioning";

/// Any of these appearing means the page has finished rendering its main block.
pub const READY_SELECTORS: [&str; 3] = [PRODUCT_TITLE, MAINTENANCE_TITLE, CONFIG_AREA];

/// Reads everything the classifier and extractor need from a loaded page.
///
/// Text fields are trimmed; an element whose text trims to empty is recorded
/// as absent, except the buy button, whose emptiness the classifier checks.
pub fn capture_snapshot(page: &dyn Page) -> PageSnapshot {
    let trimmed = |selector: &str| {
        page.query_one(selector)
            .map(|el| el.text().trim().to_owned())
            .filter(|text| !text.is_empty())
    };

    PageSnapshot {
        title: page.title(),
        body_text: page.body_text(),
        product_title_text: trimmed(PRODUCT_TITLE),
        has_os_card: page.query_one(OS_CARD).is_some(),
        has_config_area: page.query_one(CONFIG_AREA).is_some(),
        buy_button_text: page
            .query_one(BUY_BUTTON)
            .map(|el| el.text().trim().to_owned()),
        billing_cycle_radio_present: page.query_one(ANNUAL_BILLING_RADIO).is_some(),
        menu_item_count: page.query_all(MENU_ITEM).len(),
        price_widget_text: trimmed(PRICE_WIDGET),
        price_positioning_text: trimmed(PRICE_POSITIONING),
    }
}
