//! Commit attempt metrics.
//!
//! Every `commit_all` cycle opens a [`CommitSpan`] against a
//! [`CommitMetrics`] aggregate and finishes it with the cycle's outcome. The
//! aggregate is lock-free: three atomics, snapshot on demand. Most callers
//! use the process-wide [`default_commit_metrics`] aggregate; components
//! that need isolated counters (tests, embedded orchestrators) own their
//! own `static CommitMetrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Aggregated measurements over commit attempts.
///
/// Attempts are counted when a span opens, duration and failures when it
/// finishes. A snapshot taken while spans are in flight therefore reports a
/// slightly low average; the counters themselves are never lost.
#[derive(Debug)]
pub struct CommitMetrics {
    /// Commit cycles started.
    attempts: AtomicU64,
    /// Commit cycles finished with an error.
    failures: AtomicU64,
    /// Total wall-clock time spent in finished cycles.
    total_duration_nanos: AtomicU64,
}

impl CommitMetrics {
    /// Creates an empty aggregate.
    ///
    /// `const` so the aggregate can live in a `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            total_duration_nanos: AtomicU64::new(0),
        }
    }

    /// Opens a span for one commit attempt, counting it immediately.
    #[must_use]
    pub fn span(&self) -> CommitSpan<'_> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("commit attempt started");
        CommitSpan {
            metrics: self,
            started_at: Instant::now(),
        }
    }

    /// Returns the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> CommitMetricsSnapshot {
        let attempts = self.attempts.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let total = self.total_duration_nanos.load(Ordering::Relaxed);
        let average_duration = if attempts == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(total / attempts)
        };
        CommitMetricsSnapshot {
            attempts,
            failures,
            average_duration,
        }
    }

    /// Zeroes all counters.
    pub fn reset(&self) {
        self.attempts.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.total_duration_nanos.store(0, Ordering::Relaxed);
    }

    fn record_finished(&self, elapsed: Duration, failed: bool) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_duration_nanos.fetch_add(nanos, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for CommitMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-flight commit attempt.
///
/// Dropping a span without calling [`finish`](CommitSpan::finish) leaves the
/// attempt counted but contributes no duration or failure; callers are
/// expected to finish every span explicitly.
#[derive(Debug)]
pub struct CommitSpan<'m> {
    metrics: &'m CommitMetrics,
    started_at: Instant,
}

impl CommitSpan<'_> {
    /// Closes the span, recording elapsed time and the outcome.
    pub fn finish(self, failed: bool) {
        let elapsed = self.started_at.elapsed();
        self.metrics.record_finished(elapsed, failed);
        tracing::trace!(failed, ?elapsed, "commit attempt finished");
    }
}

/// Point-in-time view of a [`CommitMetrics`] aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitMetricsSnapshot {
    /// Commit cycles started.
    pub attempts: u64,
    /// Commit cycles finished with an error.
    pub failures: u64,
    /// Mean duration of a cycle (`Duration::ZERO` when no attempts).
    pub average_duration: Duration,
}

static DEFAULT: CommitMetrics = CommitMetrics::new();

/// The process-wide default aggregate.
#[must_use]
pub fn default_commit_metrics() -> &'static CommitMetrics {
    &DEFAULT
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_snapshot_starts_empty() {
        let metrics = CommitMetrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.attempts, 0);
        assert_eq!(snap.failures, 0);
        assert_eq!(snap.average_duration, Duration::ZERO);
    }

    #[test]
    fn test_span_counts_attempt_and_duration() {
        let metrics = CommitMetrics::new();

        let span = metrics.span();
        assert_eq!(metrics.snapshot().attempts, 1);
        thread::sleep(Duration::from_millis(2));
        span.finish(false);

        let snap = metrics.snapshot();
        assert_eq!(snap.attempts, 1);
        assert_eq!(snap.failures, 0);
        assert!(snap.average_duration >= Duration::from_millis(2));
    }

    #[test]
    fn test_failed_span_increments_failures() {
        let metrics = CommitMetrics::new();
        metrics.span().finish(true);
        metrics.span().finish(false);

        let snap = metrics.snapshot();
        assert_eq!(snap.attempts, 2);
        assert_eq!(snap.failures, 1);
    }

    #[test]
    fn test_average_is_total_over_attempts() {
        let metrics = CommitMetrics::new();
        metrics.total_duration_nanos.store(900, Ordering::Relaxed);
        metrics.attempts.store(3, Ordering::Relaxed);

        let snap = metrics.snapshot();
        assert_eq!(snap.average_duration, Duration::from_nanos(300));
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let metrics = CommitMetrics::new();
        metrics.span().finish(true);
        metrics.reset();

        let snap = metrics.snapshot();
        assert_eq!(snap.attempts, 0);
        assert_eq!(snap.failures, 0);
        assert_eq!(snap.average_duration, Duration::ZERO);
    }

    #[test]
    fn test_default_metrics_is_shared() {
        assert!(std::ptr::eq(default_commit_metrics(), default_commit_metrics()));
    }
}
