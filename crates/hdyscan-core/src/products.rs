use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric identifier of one catalog slot (the `pid` query parameter).
pub type Pid = i64;

/// Currency prefix used when a normalized price is displayed or stored.
pub const CURRENCY_PREFIX: &str = "¥";

/// Billing cycle the price was read under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Default,
    Annually,
}

impl BillingCycle {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BillingCycle::Default => "default",
            BillingCycle::Annually => "annually",
        }
    }

    /// Parses the stored column value. Unknown values return `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "default" => Some(BillingCycle::Default),
            "annually" => Some(BillingCycle::Annually),
            _ => None,
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields pulled out of a page that classified as a valid product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub title: String,
    /// Bare numeric price text, e.g. `"299"` or `"1299.00"`. No currency symbol.
    pub price: Option<String>,
    pub billing_cycle: BillingCycle,
}

impl ExtractedFields {
    /// Price as shown to users and stored, e.g. `"¥299"`.
    #[must_use]
    pub fn display_price(&self) -> Option<String> {
        self.price
            .as_deref()
            .map(|p| format!("{CURRENCY_PREFIX}{p}"))
    }
}

/// One persisted product, keyed by `pid`.
///
/// Serialized with the keys of the legacy results file (`pid`, `url`,
/// `billing_cycle`) so export files and legacy files share one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub pid: Pid,
    #[serde(default)]
    pub title: String,
    /// Display price with currency prefix (`"¥299"`); `None` when the page
    /// showed no price. Serialized as `""` when absent.
    #[serde(default, with = "price_field")]
    pub price: Option<String>,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl ProductRecord {
    #[must_use]
    pub fn from_fields(
        pid: Pid,
        fields: &ExtractedFields,
        source_url: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            pid,
            title: fields.title.clone(),
            price: fields.display_price(),
            billing_cycle: fields.billing_cycle,
            source_url: source_url.into(),
            last_updated: now,
        }
    }

    /// Price without the currency prefix, for numeric comparisons.
    #[must_use]
    pub fn numeric_price(&self) -> Option<&str> {
        self.price
            .as_deref()
            .map(|p| p.strip_prefix(CURRENCY_PREFIX).unwrap_or(p))
    }
}

mod price_field {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub(super) fn serialize<S: Serializer>(
        price: &Option<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(price.as_deref().unwrap_or(""))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty()))
    }
}
