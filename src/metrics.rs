// Runtime metrics for automation passes and finance summaries
//
// Counters are process-local atomics; a snapshot is served on the admin
// metrics endpoint and logged after each pass.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use utoipa::ToSchema;

/// Slow threshold for a full automation pass
const SLOW_PASS_THRESHOLD_MS: u64 = 30_000;

/// Slow threshold for a single message dispatch
const SLOW_DISPATCH_THRESHOLD_MS: u64 = 2_000;

/// Slow threshold for a finance summary
const SLOW_SUMMARY_THRESHOLD_MS: u64 = 1_000;

#[derive(Debug, Clone, Default)]
pub struct ServiceMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    passes: AtomicU64,
    failed_passes: AtomicU64,
    automations_fired: AtomicU64,
    automation_errors: AtomicU64,
    messages_sent: AtomicU64,
    dispatch_failures: AtomicU64,
    duplicates_skipped: AtomicU64,
    finance_summaries: AtomicU64,

    total_pass_time_us: AtomicU64,
    total_dispatch_time_us: AtomicU64,
    total_summary_time_us: AtomicU64,
    dispatches_timed: AtomicU64,

    slow_passes: AtomicU64,
    slow_dispatches: AtomicU64,
    slow_summaries: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_pass(&self) -> OperationTimer {
        OperationTimer::new(Operation::Pass, self.clone())
    }

    pub fn start_dispatch(&self) -> OperationTimer {
        OperationTimer::new(Operation::Dispatch, self.clone())
    }

    pub fn start_finance_summary(&self) -> OperationTimer {
        OperationTimer::new(Operation::FinanceSummary, self.clone())
    }

    pub fn record_failed_pass(&self) {
        self.inner.failed_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_automation_fired(&self) {
        self.inner.automations_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_automation_error(&self) {
        self.inner.automation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_sent(&self) {
        self.inner.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_failure(&self) {
        self.inner.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_skipped(&self) {
        self.inner.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn record(&self, operation: Operation, duration: Duration) {
        let micros = duration.as_micros() as u64;
        let (count, total, slow, threshold_ms) = match operation {
            Operation::Pass => (
                &self.inner.passes,
                &self.inner.total_pass_time_us,
                &self.inner.slow_passes,
                SLOW_PASS_THRESHOLD_MS,
            ),
            Operation::Dispatch => (
                &self.inner.dispatches_timed,
                &self.inner.total_dispatch_time_us,
                &self.inner.slow_dispatches,
                SLOW_DISPATCH_THRESHOLD_MS,
            ),
            Operation::FinanceSummary => (
                &self.inner.finance_summaries,
                &self.inner.total_summary_time_us,
                &self.inner.slow_summaries,
                SLOW_SUMMARY_THRESHOLD_MS,
            ),
        };

        count.fetch_add(1, Ordering::Relaxed);
        total.fetch_add(micros, Ordering::Relaxed);

        if duration.as_millis() as u64 > threshold_ms {
            slow.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow {}: {}ms", operation.label(), duration.as_millis());
        }
    }

    fn average_ms(count: &AtomicU64, total_us: &AtomicU64) -> f64 {
        let count = count.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            (total_us.load(Ordering::Relaxed) as f64 / count as f64) / 1000.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            passes: inner.passes.load(Ordering::Relaxed),
            failed_passes: inner.failed_passes.load(Ordering::Relaxed),
            avg_pass_time_ms: Self::average_ms(&inner.passes, &inner.total_pass_time_us),
            slow_passes: inner.slow_passes.load(Ordering::Relaxed),
            automations_fired: inner.automations_fired.load(Ordering::Relaxed),
            automation_errors: inner.automation_errors.load(Ordering::Relaxed),
            messages_sent: inner.messages_sent.load(Ordering::Relaxed),
            dispatch_failures: inner.dispatch_failures.load(Ordering::Relaxed),
            avg_dispatch_time_ms: Self::average_ms(
                &inner.dispatches_timed,
                &inner.total_dispatch_time_us,
            ),
            slow_dispatches: inner.slow_dispatches.load(Ordering::Relaxed),
            duplicates_skipped: inner.duplicates_skipped.load(Ordering::Relaxed),
            finance_summaries: inner.finance_summaries.load(Ordering::Relaxed),
            avg_finance_summary_time_ms: Self::average_ms(
                &inner.finance_summaries,
                &inner.total_summary_time_us,
            ),
            slow_finance_summaries: inner.slow_summaries.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        tracing::info!(
            "Automation metrics: {} passes ({} failed, avg {:.1}ms), {} fired, {} errors, \
             {} sent, {} dispatch failures, {} duplicates skipped",
            s.passes,
            s.failed_passes,
            s.avg_pass_time_ms,
            s.automations_fired,
            s.automation_errors,
            s.messages_sent,
            s.dispatch_failures,
            s.duplicates_skipped,
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Pass,
    Dispatch,
    FinanceSummary,
}

impl Operation {
    fn label(&self) -> &'static str {
        match self {
            Operation::Pass => "automation pass",
            Operation::Dispatch => "message dispatch",
            Operation::FinanceSummary => "finance summary",
        }
    }
}

/// Records the elapsed time once, when dropped
pub struct OperationTimer {
    start: Instant,
    operation: Operation,
    metrics: ServiceMetrics,
}

impl OperationTimer {
    fn new(operation: Operation, metrics: ServiceMetrics) -> Self {
        Self {
            start: Instant::now(),
            operation,
            metrics,
        }
    }

    /// Stop the timer now instead of at end of scope
    pub fn complete(self) {
        drop(self);
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        self.metrics.record(self.operation, self.start.elapsed());
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricsSnapshot {
    pub passes: u64,
    pub failed_passes: u64,
    pub avg_pass_time_ms: f64,
    pub slow_passes: u64,
    pub automations_fired: u64,
    pub automation_errors: u64,
    pub messages_sent: u64,
    pub dispatch_failures: u64,
    pub avg_dispatch_time_ms: f64,
    pub slow_dispatches: u64,
    pub duplicates_skipped: u64,
    pub finance_summaries: u64,
    pub avg_finance_summary_time_ms: f64,
    pub slow_finance_summaries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_start_empty() {
        let snapshot = ServiceMetrics::new().snapshot();
        assert_eq!(snapshot.passes, 0);
        assert_eq!(snapshot.avg_pass_time_ms, 0.0);
        assert_eq!(snapshot.messages_sent, 0);
    }

    #[test]
    fn test_counters() {
        let metrics = ServiceMetrics::new();
        metrics.record_automation_fired();
        metrics.record_message_sent();
        metrics.record_message_sent();
        metrics.record_duplicate_skipped();
        metrics.record_dispatch_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.automations_fired, 1);
        assert_eq!(snapshot.messages_sent, 2);
        assert_eq!(snapshot.duplicates_skipped, 1);
        assert_eq!(snapshot.dispatch_failures, 1);
    }

    #[test]
    fn test_timer_records_once() {
        let metrics = ServiceMetrics::new();

        let timer = metrics.start_pass();
        thread::sleep(Duration::from_millis(5));
        timer.complete();

        {
            let _timer = metrics.start_finance_summary();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.passes, 1);
        assert!(snapshot.avg_pass_time_ms >= 5.0);
        assert_eq!(snapshot.finance_summaries, 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = ServiceMetrics::new();
        let clone = metrics.clone();
        clone.record_message_sent();
        assert_eq!(metrics.snapshot().messages_sent, 1);
    }
}
