use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hdyscan_core::{AppConfig, BillingCycle, PageSnapshot, Pid, ProductRecord};
use hdyscan_notify::Notifier;
use hdyscan_scraper::snapshot::{
    ANNUAL_BILLING_RADIO, BUY_BUTTON, CONFIG_AREA, MENU_ITEM, OS_CARD, PRICE_POSITIONING,
    PRICE_WIDGET, PRODUCT_TITLE,
};
use hdyscan_scraper::{Element, Page, Renderer, ScraperError};
use sqlx::SqlitePool;

use super::*;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum FakeResponse {
    Page {
        snapshot: PageSnapshot,
        annual: Option<PageSnapshot>,
    },
    Fault,
    Crash,
}

/// Serves canned snapshots keyed by the trailing PID of the URL. Unknown
/// identifiers render the catalog's not-found page.
#[derive(Default)]
struct FakeRenderer {
    pages: Mutex<HashMap<Pid, FakeResponse>>,
    opened: Mutex<Vec<Pid>>,
    load_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRenderer {
    fn with_load_delay(load_delay: Duration) -> Self {
        Self {
            load_delay,
            ..Self::default()
        }
    }

    fn serve(&self, pid: Pid, snapshot: PageSnapshot) {
        self.pages.lock().unwrap().insert(
            pid,
            FakeResponse::Page {
                snapshot,
                annual: None,
            },
        );
    }

    fn serve_with_annual(&self, pid: Pid, snapshot: PageSnapshot, annual: PageSnapshot) {
        self.pages.lock().unwrap().insert(
            pid,
            FakeResponse::Page {
                snapshot,
                annual: Some(annual),
            },
        );
    }

    fn fail(&self, pid: Pid) {
        self.pages.lock().unwrap().insert(pid, FakeResponse::Fault);
    }

    fn crash(&self, pid: Pid) {
        self.pages.lock().unwrap().insert(pid, FakeResponse::Crash);
    }

    fn opened(&self) -> Vec<Pid> {
        let mut opened = self.opened.lock().unwrap().clone();
        opened.sort_unstable();
        opened
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn Page>, ScraperError> {
        let pid: Pid = url
            .rsplit('/')
            .next()
            .and_then(|tail| tail.parse().ok())
            .expect("test URLs end in the pid");
        self.opened.lock().unwrap().push(pid);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let response = self.pages.lock().unwrap().get(&pid).cloned();
        match response {
            Some(FakeResponse::Fault) => Err(ScraperError::Timeout {
                url: url.to_owned(),
                timeout_ms: timeout.as_millis(),
            }),
            Some(FakeResponse::Crash) => panic!("renderer crashed on {url}"),
            Some(FakeResponse::Page { snapshot, annual }) => Ok(Box::new(FakePage {
                current: snapshot,
                annual,
            })),
            None => Ok(Box::new(FakePage {
                current: not_found_page(),
                annual: None,
            })),
        }
    }
}

/// Answers selector queries from a snapshot; clicking the annual radio swaps
/// in the annual snapshot.
struct FakePage {
    current: PageSnapshot,
    annual: Option<PageSnapshot>,
}

#[async_trait]
impl Page for FakePage {
    async fn wait_for_any_of(&self, _selectors: &[&str], _timeout: Duration) -> bool {
        true
    }

    fn title(&self) -> String {
        self.current.title.clone()
    }

    fn body_text(&self) -> String {
        self.current.body_text.clone()
    }

    fn query_one(&self, selector: &str) -> Option<Element> {
        let page = &self.current;
        let present = |on: bool| on.then(|| Element::new(""));
        match selector {
            PRODUCT_TITLE => page.product_title_text.clone().map(Element::new),
            OS_CARD => present(page.has_os_card),
            CONFIG_AREA => present(page.has_config_area),
            BUY_BUTTON => page.buy_button_text.clone().map(Element::new),
            ANNUAL_BILLING_RADIO => present(page.billing_cycle_radio_present),
            PRICE_WIDGET => page.price_widget_text.clone().map(Element::new),
            PRICE_POSITIONING => page.price_positioning_text.clone().map(Element::new),
            _ => None,
        }
    }

    fn query_all(&self, selector: &str) -> Vec<Element> {
        if selector == MENU_ITEM {
            (0..self.current.menu_item_count)
                .map(|i| Element::new(format!("item {i}")))
                .collect()
        } else {
            self.query_one(selector).into_iter().collect()
        }
    }

    async fn trigger_click(&mut self, selector: &str) -> Result<(), ScraperError> {
        match (selector, self.annual.take()) {
            (ANNUAL_BILLING_RADIO, Some(next)) => {
                self.current = next;
                Ok(())
            }
            _ => Err(ScraperError::ElementNotFound {
                selector: selector.to_owned(),
            }),
        }
    }

    async fn wait_network_idle(&self, _timeout: Duration) {}

    async fn close(&mut self) {}
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, markdown: &str) {
        self.messages.lock().unwrap().push(markdown.to_owned());
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn not_found_page() -> PageSnapshot {
    PageSnapshot {
        title: "404 Not Found".to_owned(),
        body_text: "抱歉找不到页面".to_owned(),
        ..PageSnapshot::default()
    }
}

fn invalid_page() -> PageSnapshot {
    PageSnapshot {
        title: "购物车 - 狐蒂云".to_owned(),
        body_text: "购物车".to_owned(),
        menu_item_count: 8,
        ..PageSnapshot::default()
    }
}

fn product_page(title: &str, price_widget: &str) -> PageSnapshot {
    PageSnapshot {
        title: "云服务器 - 狐蒂云".to_owned(),
        body_text: format!("{title} 立即购买"),
        product_title_text: Some(title.to_owned()),
        has_os_card: true,
        has_config_area: true,
        buy_button_text: Some("立即购买".to_owned()),
        billing_cycle_radio_present: false,
        menu_item_count: 6,
        price_widget_text: Some(price_widget.to_owned()),
        price_positioning_text: Some("¥".to_owned()),
    }
}

fn stored(pid: Pid, price: &str) -> ProductRecord {
    ProductRecord {
        pid,
        title: format!("stored #{pid}"),
        price: Some(price.to_owned()),
        billing_cycle: BillingCycle::Default,
        source_url: format!("fake://catalog/{pid}"),
        last_updated: Utc::now(),
    }
}

fn settings() -> ScanSettings {
    ScanSettings {
        product_url_template: "fake://catalog/{pid}".to_owned(),
        failure_threshold: 50,
        high_price_threshold: 9999,
        page_timeout: Duration::from_secs(1),
        settle_timeout: Duration::from_millis(10),
        inter_request_delay: Duration::ZERO,
    }
}

/// Config whose export and legacy paths live in a fresh scratch directory.
fn app_config(scratch: &str) -> AppConfig {
    let dir = std::env::temp_dir().join(format!("hdyscan-cli-{}-{scratch}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    AppConfig {
        database_url: "sqlite::memory:".to_owned(),
        export_path: dir.join("export.json"),
        legacy_path: dir.join("missing-legacy.json"),
        product_url_template: "fake://catalog/{pid}".to_owned(),
        log_level: "info".to_owned(),
        webhook_url: None,
        workers: 3,
        failure_threshold: 50,
        high_price_threshold: 9999,
        page_timeout_secs: 1,
        settle_timeout_ms: 10,
        inter_request_delay_ms: 0,
        user_agent: "hdyscan-test".to_owned(),
        db_max_connections: 1,
        db_acquire_timeout_secs: 10,
    }
}

fn range(start: Pid, end: Pid) -> ScanOptions {
    ScanOptions {
        start,
        end: Some(end),
        budget: None,
        workers: 3,
        skip_known: false,
    }
}

struct Harness {
    pool: SqlitePool,
    renderer: Arc<FakeRenderer>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_renderer(FakeRenderer::default()).await
    }

    async fn with_renderer(renderer: FakeRenderer) -> Self {
        let pool = hdyscan_db::open_store("sqlite::memory:", hdyscan_db::PoolConfig::default())
            .await
            .expect("in-memory store should open");
        Self {
            pool,
            renderer: Arc::new(renderer),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    fn context(&self) -> Arc<ScanContext> {
        Arc::new(ScanContext {
            pool: self.pool.clone(),
            renderer: self.renderer.clone(),
            notifier: self.notifier.clone(),
            settings: settings(),
        })
    }

    async fn scan(&self, options: &ScanOptions) -> ScanReport {
        run_scan(self.context(), options, Arc::new(AtomicBool::new(false))).await
    }

    /// Runs the full command path and returns the report with the export path.
    async fn scan_and_export(
        &self,
        scratch: &str,
        options: &ScanOptions,
        interrupted: bool,
    ) -> (ScanReport, PathBuf) {
        let config = app_config(scratch);
        let report = scan_and_export(
            self.context(),
            &config,
            options,
            Arc::new(AtomicBool::new(interrupted)),
        )
        .await
        .expect("scan command should succeed");
        (report, config.export_path)
    }

    async fn stored(&self, pid: Pid) -> Option<ProductRecord> {
        hdyscan_db::get_product(&self.pool, pid).await.unwrap()
    }
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_range_leaves_store_unchanged() {
    let h = Harness::new().await;

    let report = h.scan(&range(10, 12)).await;

    assert_eq!(report.dispatched, 3);
    assert_eq!(report.not_found, 3);
    assert_eq!(report.consecutive_failures, 3);
    assert_eq!(report.stop_reason, StopReason::RangeComplete);
    assert_eq!(report.last_identifier, Some(12));
    assert_eq!(hdyscan_db::count_products(&h.pool).await.unwrap(), 0);
    assert!(h.notifier.messages().is_empty());
    assert_eq!(h.renderer.opened(), vec![10, 11, 12]);
}

#[tokio::test]
async fn new_product_then_price_change_notifies_both_times() {
    let h = Harness::new().await;
    h.renderer.serve(20, product_page("香港 CN2 2C4G", "199"));

    let first = h.scan(&range(20, 20)).await;

    assert_eq!(first.valid, 1);
    assert_eq!(first.new_products, 1);
    assert_eq!(first.consecutive_failures, 0);
    assert_eq!(h.stored(20).await.unwrap().price.as_deref(), Some("¥199"));
    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("### New product"));

    h.renderer.serve(20, product_page("香港 CN2 2C4G", "249"));
    let second = h.scan(&range(20, 20)).await;

    assert_eq!(second.price_changes, 1);
    assert_eq!(second.new_products, 0);
    assert_eq!(h.stored(20).await.unwrap().price.as_deref(), Some("¥249"));
    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].starts_with("### Price changed"));
    assert!(messages[1].contains("¥199 → **¥249**"));
}

#[tokio::test]
async fn bare_widget_price_is_stored_with_currency_prefix() {
    let h = Harness::new().await;
    h.renderer.serve(30, product_page("美国 CN2 1C2G", "299"));

    h.scan(&range(30, 30)).await;

    let record = h.stored(30).await.unwrap();
    assert_eq!(record.price.as_deref(), Some("¥299"));
    assert_eq!(record.numeric_price(), Some("299"));
    assert_eq!(record.title, "美国 CN2 1C2G");
    assert_eq!(record.source_url, "fake://catalog/30");
}

#[tokio::test]
async fn unchanged_rescan_updates_record_without_notifying() {
    let h = Harness::new().await;
    h.renderer.serve(21, product_page("香港 CN2", "199"));
    h.scan(&range(21, 21)).await;
    let before = h.stored(21).await.unwrap();

    let report = h.scan(&range(21, 21)).await;

    assert_eq!(report.valid, 1);
    assert_eq!(report.new_products + report.price_changes, 0);
    assert_eq!(h.notifier.messages().len(), 1);
    let after = h.stored(21).await.unwrap();
    assert_eq!(after.price, before.price);
    assert!(after.last_updated >= before.last_updated);
}

#[tokio::test]
async fn annual_option_is_selected_and_priced() {
    let h = Harness::new().await;
    let monthly = PageSnapshot {
        billing_cycle_radio_present: true,
        ..product_page("香港 CN2 4C8G", "299")
    };
    let annual = PageSnapshot {
        billing_cycle_radio_present: true,
        ..product_page("香港 CN2 4C8G", "2,990")
    };
    h.renderer.serve_with_annual(31, monthly, annual);

    h.scan(&range(31, 31)).await;

    let record = h.stored(31).await.unwrap();
    assert_eq!(record.billing_cycle, BillingCycle::Annually);
    assert_eq!(record.price.as_deref(), Some("¥2990"));
}

#[tokio::test]
async fn failed_annual_switch_keeps_default_cycle() {
    let h = Harness::new().await;
    let monthly = PageSnapshot {
        billing_cycle_radio_present: true,
        ..product_page("香港 CN2 4C8G", "299")
    };
    // Radio advertised but the click has nothing to switch to.
    h.renderer.serve(32, monthly);

    let report = h.scan(&range(32, 32)).await;

    assert_eq!(report.valid, 1);
    let record = h.stored(32).await.unwrap();
    assert_eq!(record.billing_cycle, BillingCycle::Default);
    assert_eq!(record.price.as_deref(), Some("¥299"));
}

#[tokio::test]
async fn zero_budget_dispatches_nothing_and_still_exports() {
    let h = Harness::new().await;
    let options = ScanOptions {
        start: 1,
        end: None,
        budget: Some(Duration::ZERO),
        workers: 5,
        skip_known: false,
    };

    let (report, export_path) = h.scan_and_export("zero-budget", &options, false).await;

    assert_eq!(report.dispatched, 0);
    assert_eq!(report.stop_reason, StopReason::BudgetExhausted);
    assert!(h.renderer.opened().is_empty());
    let export = hdyscan_db::read_export(&export_path).await.unwrap();
    assert!(export.success.is_empty());
    assert!(export.failed.is_empty());
    assert_eq!(export.last_identifier, None);
}

#[tokio::test]
async fn interrupted_scan_still_exports_stored_records() {
    let h = Harness::new().await;
    hdyscan_db::upsert_product(&h.pool, &stored(7, "¥59")).await.unwrap();

    let (report, export_path) = h.scan_and_export("interrupted", &range(1, 100), true).await;

    assert_eq!(report.stop_reason, StopReason::Interrupted);
    assert_eq!(report.dispatched, 0);
    let export = hdyscan_db::read_export(&export_path).await.unwrap();
    assert_eq!(export.success.len(), 1);
    assert_eq!(export.success[0].pid, 7);
    assert_eq!(export.last_identifier, Some(7));
}

#[tokio::test]
async fn completed_scan_exports_what_it_found() {
    let h = Harness::new().await;
    h.renderer.serve(3, product_page("香港 CN2", "99"));

    let (report, export_path) = h.scan_and_export("completed", &range(1, 4), false).await;

    assert_eq!(report.stop_reason, StopReason::RangeComplete);
    let export = hdyscan_db::read_export(&export_path).await.unwrap();
    assert_eq!(export.success.len(), 1);
    assert_eq!(export.success[0].price.as_deref(), Some("¥99"));
}

#[tokio::test]
async fn breaker_stops_unbounded_scan_after_fifty_failures() {
    let h = Harness::new().await;
    let options = ScanOptions {
        start: 1,
        end: None,
        budget: None,
        workers: 5,
        skip_known: false,
    };

    let report = h.scan(&options).await;

    assert_eq!(report.stop_reason, StopReason::FailureThreshold);
    assert!(report.consecutive_failures >= 50);
    // At most 2 * workers units can be outstanding when the breaker trips.
    assert!(
        (50..60).contains(&report.dispatched),
        "dispatched {}",
        report.dispatched
    );
    assert_eq!(report.not_found, report.dispatched);
}

#[tokio::test]
async fn fetch_fault_counts_as_failure_and_run_continues() {
    let h = Harness::new().await;
    h.renderer.fail(5);
    h.renderer.serve(6, product_page("香港 CN2", "99"));

    let report = h.scan(&ScanOptions {
        workers: 1,
        ..range(5, 7)
    })
    .await;

    assert_eq!(report.faults, 1);
    assert_eq!(report.valid, 1);
    assert_eq!(report.not_found, 1);
    // Completion order with one worker: fault, valid (reset), not-found.
    assert_eq!(report.consecutive_failures, 1);
    assert!(h.stored(6).await.is_some());
}

#[tokio::test]
async fn invalid_pages_count_toward_the_breaker() {
    let h = Harness::new().await;
    for pid in 1..=3 {
        h.renderer.serve(pid, invalid_page());
    }

    let report = h.scan(&range(1, 3)).await;

    assert_eq!(report.invalid, 3);
    assert_eq!(report.consecutive_failures, 3);
    assert_eq!(hdyscan_db::count_products(&h.pool).await.unwrap(), 0);
}

#[tokio::test]
async fn disappeared_product_keeps_last_known_record() {
    let h = Harness::new().await;
    let previous = stored(40, "¥88");
    hdyscan_db::upsert_product(&h.pool, &previous).await.unwrap();

    let report = h.scan(&range(40, 40)).await;

    assert_eq!(report.not_found, 1);
    let kept = h.stored(40).await.expect("record should survive");
    assert_eq!(kept.title, previous.title);
    assert_eq!(kept.price, previous.price);
    assert_eq!(kept.source_url, previous.source_url);
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn skip_known_does_not_fetch_stored_identifiers() {
    let h = Harness::new().await;
    hdyscan_db::upsert_product(&h.pool, &stored(50, "¥10")).await.unwrap();

    let report = h
        .scan(&ScanOptions {
            skip_known: true,
            ..range(49, 51)
        })
        .await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.dispatched, 2);
    assert_eq!(h.renderer.opened(), vec![49, 51]);
    assert_eq!(report.last_identifier, Some(51));
}

#[tokio::test]
async fn interrupt_before_start_dispatches_nothing() {
    let h = Harness::new().await;

    let report = run_scan(h.context(), &range(1, 100), Arc::new(AtomicBool::new(true))).await;

    assert_eq!(report.dispatched, 0);
    assert_eq!(report.stop_reason, StopReason::Interrupted);
}

#[tokio::test]
async fn store_failure_discards_delta_but_keeps_scanning() {
    let h = Harness::new().await;
    h.renderer.serve(60, product_page("香港 CN2", "99"));
    h.pool.close().await;

    let report = h.scan(&range(60, 61)).await;

    assert_eq!(report.valid, 1);
    assert_eq!(report.persistence_faults, 1);
    assert_eq!(report.not_found, 1);
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn concurrency_never_exceeds_worker_width() {
    let h = Harness::with_renderer(FakeRenderer::with_load_delay(Duration::from_millis(20))).await;

    let report = h
        .scan(&ScanOptions {
            workers: 2,
            ..range(1, 10)
        })
        .await;

    assert_eq!(report.dispatched, 10);
    let peak = h.renderer.max_in_flight.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak in-flight loads: {peak}");
}

#[tokio::test]
async fn priceless_rescan_keeps_price_and_does_not_flap() {
    let h = Harness::new().await;
    h.renderer.serve(22, product_page("香港 CN2", "199"));
    h.scan(&range(22, 22)).await;

    // Price on request: no number in the widget and none in the body.
    h.renderer.serve(22, product_page("香港 CN2", "面议"));
    let blank = h.scan(&range(22, 22)).await;
    assert_eq!(blank.valid, 1);
    assert_eq!(h.stored(22).await.unwrap().price.as_deref(), Some("¥199"));

    h.renderer.serve(22, product_page("香港 CN2", "199"));
    let back = h.scan(&range(22, 22)).await;

    assert_eq!(blank.price_changes + back.price_changes, 0);
    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1, "only the first sighting notifies: {messages:?}");
    assert!(messages[0].starts_with("### New product"));
}

#[tokio::test]
async fn panicked_unit_counts_as_fault_and_breaker_failure() {
    let h = Harness::new().await;
    h.renderer.crash(8);

    let report = h.scan(&range(8, 8)).await;

    assert_eq!(report.dispatched, 1);
    assert_eq!(report.faults, 1);
    assert_eq!(report.consecutive_failures, 1);
}

#[test]
fn product_url_substitutes_pid() {
    let settings = ScanSettings::from_app_config(&app_config("url"));
    assert_eq!(settings.product_url(1850), "fake://catalog/1850");
    assert_eq!(settings.page_timeout, Duration::from_secs(1));
    assert!(settings.inter_request_delay.is_zero());
}
