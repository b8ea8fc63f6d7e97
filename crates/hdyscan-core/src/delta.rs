//! Change detection between a stored product and a fresh extraction.

use crate::products::ProductRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    New,
    PriceChanged,
    Unchanged,
}

/// What changed for one identifier in one scan pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub kind: DeltaKind,
    /// The fresh record, as it will be stored.
    pub record: ProductRecord,
    /// Stored price before this pass; set only for [`DeltaKind::PriceChanged`].
    pub previous_price: Option<String>,
}

impl Delta {
    /// `New` and `PriceChanged` deltas are announced; `Unchanged` is not.
    #[must_use]
    pub fn is_notifiable(&self) -> bool {
        matches!(self.kind, DeltaKind::New | DeltaKind::PriceChanged)
    }
}

/// Compares a fresh record against the stored one for the same identifier.
///
/// A fresh record without a price keeps the stored price and never counts as
/// a price change. Billing-cycle-only differences are `Unchanged`.
#[must_use]
pub fn diff(existing: Option<&ProductRecord>, mut fresh: ProductRecord) -> Delta {
    let Some(existing) = existing else {
        return Delta {
            kind: DeltaKind::New,
            record: fresh,
            previous_price: None,
        };
    };

    if fresh.price.is_none() {
        fresh.price.clone_from(&existing.price);
    }

    let price_changed = fresh
        .price
        .as_deref()
        .is_some_and(|price| existing.price.as_deref() != Some(price));

    if price_changed {
        Delta {
            kind: DeltaKind::PriceChanged,
            previous_price: existing.price.clone(),
            record: fresh,
        }
    } else {
        Delta {
            kind: DeltaKind::Unchanged,
            record: fresh,
            previous_price: None,
        }
    }
}
