//! The `scan` command: sweep an identifier range, classify each catalog page,
//! and record valid products.
//!
//! Per-identifier failures are logged and counted rather than propagated so a
//! single bad page never aborts the run; only the stop conditions in
//! [`governor`] end a scan.

mod governor;
mod pipeline;
mod runner;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use hdyscan_core::{AppConfig, Pid};
use hdyscan_notify::Notifier;
use hdyscan_scraper::Renderer;
use sqlx::SqlitePool;

pub(crate) use runner::run_scan;

/// What to scan in one run.
#[derive(Debug, Clone)]
pub(crate) struct ScanOptions {
    pub start: Pid,
    /// Inclusive upper bound; `None` scans until a stop condition fires.
    pub end: Option<Pid>,
    pub budget: Option<Duration>,
    pub workers: usize,
    /// Skip identifiers already in the store without fetching them.
    pub skip_known: bool,
}

/// Why the dispatcher stopped issuing work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum StopReason {
    #[default]
    RangeComplete,
    BudgetExhausted,
    FailureThreshold,
    Interrupted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::RangeComplete => write!(f, "range complete"),
            StopReason::BudgetExhausted => write!(f, "time budget exhausted"),
            StopReason::FailureThreshold => write!(f, "consecutive failure threshold reached"),
            StopReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ScanReport {
    pub dispatched: usize,
    pub valid: usize,
    pub not_found: usize,
    pub invalid: usize,
    pub faults: usize,
    pub new_products: usize,
    pub price_changes: usize,
    /// Valid pages whose result could not be stored; their deltas were dropped.
    pub persistence_faults: usize,
    pub skipped: usize,
    /// Breaker count when the run stopped.
    pub consecutive_failures: u32,
    pub stop_reason: StopReason,
    /// Highest identifier dispatched or skipped.
    pub last_identifier: Option<Pid>,
}

/// Scan tunables taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub(crate) struct ScanSettings {
    pub product_url_template: String,
    pub failure_threshold: u32,
    pub high_price_threshold: u64,
    pub page_timeout: Duration,
    pub settle_timeout: Duration,
    pub inter_request_delay: Duration,
}

impl ScanSettings {
    pub(crate) fn from_app_config(config: &AppConfig) -> Self {
        Self {
            product_url_template: config.product_url_template.clone(),
            failure_threshold: config.failure_threshold,
            high_price_threshold: config.high_price_threshold,
            page_timeout: Duration::from_secs(config.page_timeout_secs),
            settle_timeout: Duration::from_millis(config.settle_timeout_ms),
            inter_request_delay: Duration::from_millis(config.inter_request_delay_ms),
        }
    }

    pub(crate) fn product_url(&self, pid: Pid) -> String {
        self.product_url_template.replace("{pid}", &pid.to_string())
    }
}

/// Everything a work unit needs; shared read-only across units.
pub(crate) struct ScanContext {
    pub pool: SqlitePool,
    pub renderer: Arc<dyn Renderer>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: ScanSettings,
}

/// Runs the `scan` command against the live catalog.
///
/// # Errors
///
/// Returns an error if the HTTP renderer cannot be built, or if
/// [`scan_and_export`] fails.
pub(crate) async fn run_scan_command(
    pool: &SqlitePool,
    config: &AppConfig,
    options: &ScanOptions,
    interrupt: Arc<AtomicBool>,
) -> anyhow::Result<ScanReport> {
    let renderer = hdyscan_scraper::HttpRenderer::new(&config.user_agent)
        .map_err(|e| anyhow::anyhow!("failed to build HTTP renderer: {e}"))?;
    let ctx = Arc::new(ScanContext {
        pool: pool.clone(),
        renderer: Arc::new(renderer),
        notifier: hdyscan_notify::notifier_from_config(config.webhook_url.as_deref()),
        settings: ScanSettings::from_app_config(config),
    });

    scan_and_export(ctx, config, options, interrupt).await
}

/// Legacy import, scan, summary, and final export.
///
/// The export runs however the scan stopped, including on interruption.
///
/// # Errors
///
/// Returns an error if the legacy import or the final export fails.
/// Per-identifier failures never surface here.
pub(crate) async fn scan_and_export(
    ctx: Arc<ScanContext>,
    config: &AppConfig,
    options: &ScanOptions,
    interrupt: Arc<AtomicBool>,
) -> anyhow::Result<ScanReport> {
    crate::store::migrate_legacy(&ctx.pool, config).await?;

    match options.end {
        Some(end) => println!("Starting scan from PID {} to {end}", options.start),
        None => println!("Starting scan from PID {} (continuous mode)", options.start),
    }

    let report = run_scan(Arc::clone(&ctx), options, interrupt).await;

    if report.stop_reason == StopReason::FailureThreshold {
        println!(
            "\n🛑 Stopping: no valid product in {} consecutive PIDs.",
            report.consecutive_failures
        );
    }
    println!(
        "\nScan complete. Found {} valid products ({} new, {} price changes).",
        report.valid, report.new_products, report.price_changes
    );
    if let Some(last) = report.last_identifier {
        println!("Last PID checked: {last} ({})", report.stop_reason);
    }

    let summary = crate::store::export_store(&ctx.pool, config).await?;
    println!(
        "Exported {} records to {}",
        summary.records,
        summary.path.display()
    );

    Ok(report)
}

#[cfg(test)]
#[path = "scan_test.rs"]
mod tests;
