/// The rendered-page facts the classifier and extractor work from.
///
/// Captured once per fetch and owned by the work unit that fetched it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    /// Document `<title>` text.
    pub title: String,
    /// Visible text of `<body>`.
    pub body_text: String,
    /// Text of the product heading, when the heading element exists.
    pub product_title_text: Option<String>,
    pub has_os_card: bool,
    pub has_config_area: bool,
    /// Text of the buy button, when the button element exists.
    pub buy_button_text: Option<String>,
    /// Whether an annual billing-cycle radio input is on the page.
    pub billing_cycle_radio_present: bool,
    pub menu_item_count: usize,
    pub price_widget_text: Option<String>,
    pub price_positioning_text: Option<String>,
}

/// Classification outcome for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    NotFound,
    ValidProduct,
    Invalid,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::NotFound => write!(f, "not-found"),
            Verdict::ValidProduct => write!(f, "valid-product"),
            Verdict::Invalid => write!(f, "invalid"),
        }
    }
}
