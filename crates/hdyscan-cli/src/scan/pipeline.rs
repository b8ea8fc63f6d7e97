//! One identifier's unit of work: fetch, classify, extract, diff, persist,
//! notify.

use std::time::Duration;

use chrono::Utc;
use hdyscan_core::{diff, DeltaKind, ExtractedFields, Pid, ProductRecord, Verdict};
use hdyscan_scraper::snapshot::ANNUAL_BILLING_RADIO;
use hdyscan_scraper::{capture_snapshot, classify, extract, Page, ScraperError, READY_SELECTORS};

use super::ScanContext;

/// How one unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UnitOutcome {
    Valid {
        /// `None` when the store could not be read or written; the delta was
        /// discarded.
        change: Option<DeltaKind>,
        /// Title and display price, for the progress line.
        summary: String,
    },
    NotFound,
    Invalid,
    /// The page could not be loaded.
    Fault,
}

impl UnitOutcome {
    /// Only valid pages reset the circuit breaker.
    pub(crate) fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Valid { .. })
    }

    pub(crate) fn progress_line(&self) -> String {
        match self {
            UnitOutcome::Valid {
                change: Some(DeltaKind::New),
                summary,
            } => format!("✅ New: {summary}"),
            UnitOutcome::Valid {
                change: Some(DeltaKind::PriceChanged),
                summary,
            } => format!("✅ Price changed: {summary}"),
            UnitOutcome::Valid {
                change: Some(DeltaKind::Unchanged),
                summary,
            } => format!("✅ {summary}"),
            UnitOutcome::Valid {
                change: None,
                summary,
            } => format!("⚠️ Valid but not stored: {summary}"),
            UnitOutcome::NotFound => "❌ Page not found".to_owned(),
            UnitOutcome::Invalid => "❌ Not a valid product page".to_owned(),
            UnitOutcome::Fault => "⚠️ Fetch failed".to_owned(),
        }
    }
}

/// Runs the full pipeline for `pid`. Never fails: every fault becomes an
/// outcome.
pub(crate) async fn process_pid(ctx: &ScanContext, pid: Pid) -> UnitOutcome {
    polite_delay(ctx.settings.inter_request_delay).await;

    let url = ctx.settings.product_url(pid);
    let mut page = match ctx.renderer.open(&url, ctx.settings.page_timeout).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(pid, url = %url, error = %e, "failed to load page");
            return UnitOutcome::Fault;
        }
    };

    let outcome = evaluate(ctx, pid, &url, &mut *page).await;
    page.close().await;
    outcome
}

async fn evaluate(ctx: &ScanContext, pid: Pid, url: &str, page: &mut dyn Page) -> UnitOutcome {
    let settle = ctx.settings.settle_timeout;
    if !page.wait_for_any_of(&READY_SELECTORS, settle).await {
        tracing::debug!(pid, "no ready selector appeared; classifying what loaded");
    }

    let snapshot = capture_snapshot(&*page);
    match classify(&snapshot) {
        Verdict::NotFound => {
            note_disappearance(ctx, pid).await;
            UnitOutcome::NotFound
        }
        Verdict::Invalid => {
            tracing::debug!(
                pid,
                menu_items = snapshot.menu_item_count,
                "page has no product signals"
            );
            UnitOutcome::Invalid
        }
        Verdict::ValidProduct => {
            let fields = extract(&snapshot, ctx.settings.high_price_threshold, move || async move {
                page.trigger_click(ANNUAL_BILLING_RADIO).await?;
                page.wait_network_idle(settle).await;
                Ok::<_, ScraperError>(capture_snapshot(&*page))
            })
            .await;
            record_product(ctx, pid, url, &fields).await
        }
    }
}

/// Diffs against the store, upserts, and notifies on a notifiable delta.
async fn record_product(
    ctx: &ScanContext,
    pid: Pid,
    url: &str,
    fields: &ExtractedFields,
) -> UnitOutcome {
    let summary = match fields.display_price() {
        Some(price) => format!("{} {price}", fields.title),
        None => fields.title.clone(),
    };

    let existing = match hdyscan_db::get_product(&ctx.pool, pid).await {
        Ok(existing) => existing,
        Err(e) => {
            tracing::warn!(pid, error = %e, "store lookup failed; discarding result");
            return UnitOutcome::Valid {
                change: None,
                summary,
            };
        }
    };

    let fresh = ProductRecord::from_fields(pid, fields, url, Utc::now());
    let delta = diff(existing.as_ref(), fresh);

    if let Err(e) = hdyscan_db::upsert_product(&ctx.pool, &delta.record).await {
        tracing::warn!(pid, error = %e, "failed to persist product; discarding delta");
        return UnitOutcome::Valid {
            change: None,
            summary,
        };
    }

    if let Some(message) = hdyscan_notify::format_delta(&delta) {
        ctx.notifier.send(&message).await;
    }

    UnitOutcome::Valid {
        change: Some(delta.kind),
        summary,
    }
}

/// A stored product that now renders as not-found keeps its last-known record.
async fn note_disappearance(ctx: &ScanContext, pid: Pid) {
    if let Ok(Some(previous)) = hdyscan_db::get_product(&ctx.pool, pid).await {
        tracing::info!(
            pid,
            title = %previous.title,
            "previously valid product now not found; keeping last-known record"
        );
    }
}

/// Sleeps `base` plus up to 25% jitter so workers do not hit the catalog in
/// lockstep.
async fn polite_delay(base: Duration) {
    if base.is_zero() {
        return;
    }
    let jitter = 1.0 + rand::random::<f64>() * 0.25;
    tokio::time::sleep(base.mul_f64(jitter)).await;
}
