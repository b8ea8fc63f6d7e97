//! The bounded-concurrency dispatcher.
//!
//! `Running` walks the cursor upward, dispatching one unit per identifier
//! until a stop condition fires; `Draining` awaits every outstanding unit;
//! `Stopped` returns the report. Units run on a `JoinSet`, at most `workers`
//! at once (semaphore), with at most `2 * workers` outstanding.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hdyscan_core::{DeltaKind, Pid};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

use super::governor::{CircuitBreaker, TimeGovernor};
use super::pipeline::{process_pid, UnitOutcome};
use super::{ScanContext, ScanOptions, ScanReport, StopReason};

type UnitResult = Result<(Pid, UnitOutcome), JoinError>;

/// Scans `options.start..=options.end` (or upward until stopped).
///
/// `interrupt` is checked before every dispatch, like the breaker and the
/// time budget; none of them cancel units already dispatched.
pub(crate) async fn run_scan(
    ctx: Arc<ScanContext>,
    options: &ScanOptions,
    interrupt: Arc<AtomicBool>,
) -> ScanReport {
    let workers = options.workers.max(1);
    let max_outstanding = workers * 2;
    let semaphore = Arc::new(Semaphore::new(workers));
    let breaker = Arc::new(CircuitBreaker::new(ctx.settings.failure_threshold));
    let governor = TimeGovernor::start(options.budget);
    let known = if options.skip_known {
        load_known(&ctx).await
    } else {
        HashSet::new()
    };

    let mut report = ScanReport::default();
    let mut tasks: JoinSet<(Pid, UnitOutcome)> = JoinSet::new();
    let mut cursor = options.start;

    tracing::info!(
        start = options.start,
        end = ?options.end,
        budget_secs = ?options.budget.map(|b| b.as_secs()),
        workers,
        "scan running"
    );

    let stop_reason = loop {
        while let Some(result) = tasks.try_join_next() {
            tally(&mut report, &breaker, result);
        }

        if let Some(reason) = stop_condition(&interrupt, &governor, &breaker, options, cursor) {
            break reason;
        }

        if known.contains(&cursor) {
            breaker.record_success();
            println!("PID {cursor} ⏭ already stored, skipping");
            report.skipped += 1;
            report.last_identifier = Some(cursor);
            cursor += 1;
            continue;
        }

        if tasks.len() >= max_outstanding {
            if let Some(result) = tasks.join_next().await {
                tally(&mut report, &breaker, result);
            }
            continue;
        }

        let pid = cursor;
        let ctx = Arc::clone(&ctx);
        let semaphore = Arc::clone(&semaphore);
        let breaker = Arc::clone(&breaker);
        tasks.spawn(
            async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = process_pid(&ctx, pid).await;
                breaker.record(outcome.is_success());
                (pid, outcome)
            }
            .instrument(tracing::info_span!("unit", pid)),
        );
        report.dispatched += 1;
        report.last_identifier = Some(pid);
        cursor += 1;
    };

    tracing::info!(
        reason = %stop_reason,
        outstanding = tasks.len(),
        "scan draining"
    );
    while let Some(result) = tasks.join_next().await {
        tally(&mut report, &breaker, result);
    }

    report.stop_reason = stop_reason;
    report.consecutive_failures = breaker.consecutive_failures();
    tracing::info!(
        reason = %stop_reason,
        dispatched = report.dispatched,
        valid = report.valid,
        "scan stopped"
    );
    report
}

fn stop_condition(
    interrupt: &AtomicBool,
    governor: &TimeGovernor,
    breaker: &CircuitBreaker,
    options: &ScanOptions,
    cursor: Pid,
) -> Option<StopReason> {
    if interrupt.load(Ordering::SeqCst) {
        Some(StopReason::Interrupted)
    } else if governor.expired() {
        Some(StopReason::BudgetExhausted)
    } else if breaker.should_stop() {
        Some(StopReason::FailureThreshold)
    } else if options.end.is_some_and(|end| cursor > end) {
        Some(StopReason::RangeComplete)
    } else {
        None
    }
}

async fn load_known(ctx: &ScanContext) -> HashSet<Pid> {
    match hdyscan_db::export_all_products(&ctx.pool).await {
        Ok(records) => records.into_iter().map(|r| r.pid).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to load stored identifiers; scanning all");
            HashSet::new()
        }
    }
}

/// A panicked unit never reached its own breaker update, so it is recorded
/// as a failure here.
fn tally(report: &mut ScanReport, breaker: &CircuitBreaker, result: UnitResult) {
    let (pid, outcome) = match result {
        Ok(done) => done,
        Err(e) => {
            tracing::error!(error = %e, "work unit panicked");
            breaker.record_failure();
            report.faults += 1;
            return;
        }
    };

    println!("PID {pid} {}", outcome.progress_line());
    match &outcome {
        UnitOutcome::Valid { change, .. } => {
            report.valid += 1;
            match change {
                Some(DeltaKind::New) => report.new_products += 1,
                Some(DeltaKind::PriceChanged) => report.price_changes += 1,
                Some(DeltaKind::Unchanged) => {}
                None => report.persistence_faults += 1,
            }
        }
        UnitOutcome::NotFound => report.not_found += 1,
        UnitOutcome::Invalid => report.invalid += 1,
        UnitOutcome::Fault => report.faults += 1,
    }
}
