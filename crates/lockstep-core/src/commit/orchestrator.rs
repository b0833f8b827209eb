//! Two-phase commit orchestration across registered banks.
//!
//! ## Commit Cycle
//!
//! ```text
//! commit_all(cancel)
//!     │
//!     ▼
//! acquire writer lock ── serialises all cycles process-wide
//!     │
//!     ▼
//! prepare loop ───────── registration order, cancel checked per bank
//!     │         \
//!     │          └─ error ──▶ abort collected stages in REVERSE order
//!     │                        notify observer(err), return err
//!     ▼
//! notify observer(ok) ── strictly before any publish
//!     │
//!     ▼
//! publish loop ───────── registration order, infallible
//!     │
//!     ▼
//! version += 1 ───────── release store, paired with acquire loads
//! ```
//!
//! Readers never block on a cycle and always observe either the pre-commit
//! or the post-commit state of every bank, never a mixture: no staged state
//! is visible before the publish loop, and the publish loop runs entirely
//! inside the writer lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lockstep_observe::{default_commit_metrics, CommitMetrics};
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::bank::{Bank, StagedCommit};
use super::cancel::{CancelToken, CommitObserver};
use super::error::CommitError;

/// Per-cycle stage list; inline for typical bank counts.
type StageList = SmallVec<[Box<dyn StagedCommit>; 4]>;

/// Coordinates atomic commits across an ordered set of banks.
///
/// The bank list is only read or grown under the writer lock, the same lock
/// that serialises [`commit_all`](Self::commit_all) cycles, so registration
/// never races an in-flight commit.
pub struct CommitOrchestrator {
    /// Bank list, guarded by the process-wide writer lock.
    banks: Mutex<Vec<Arc<dyn Bank>>>,
    /// Published version, bumped once per successful cycle.
    version: AtomicU64,
    metrics: &'static CommitMetrics,
}

impl CommitOrchestrator {
    /// Creates an orchestrator over a private copy of `banks`, reporting to
    /// the process-wide default commit metrics.
    #[must_use]
    pub fn new<I>(banks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Bank>>,
    {
        Self::with_metrics(banks, default_commit_metrics())
    }

    /// Creates an orchestrator reporting to a caller-owned metrics
    /// aggregate instead of the process-wide default.
    #[must_use]
    pub fn with_metrics<I>(banks: I, metrics: &'static CommitMetrics) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Bank>>,
    {
        Self {
            banks: Mutex::new(banks.into_iter().collect()),
            version: AtomicU64::new(0),
            metrics,
        }
    }

    /// Appends a bank at runtime.
    ///
    /// Takes the writer lock, so registration is serialised against
    /// in-flight commits; the new bank takes part from the next cycle on.
    pub fn register_bank(&self, bank: Arc<dyn Bank>) {
        self.banks.lock().push(bank);
    }

    /// The currently published version.
    ///
    /// The acquire load pairs with the release bump in
    /// [`commit_all`](Self::commit_all): a reader that sees version `v`
    /// also sees every publish of cycle `v`.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Runs one two-phase commit cycle over all registered banks.
    ///
    /// Banks are prepared in registration order; on success every stage is
    /// published in that same order and the version is bumped by one. On a
    /// prepare error or cancellation, the stages collected so far are
    /// aborted in reverse order, the version is untouched, and the error is
    /// returned unchanged. A commit observer attached to `cancel` is
    /// notified exactly once either way.
    ///
    /// With no banks registered this succeeds without bumping the version
    /// (the observer still fires).
    ///
    /// # Errors
    ///
    /// Returns the cancel token's error when cancellation is observed
    /// before or between prepares, or the first bank's prepare error
    /// otherwise.
    pub fn commit_all(&self, cancel: &CancelToken) -> Result<(), CommitError> {
        let span = self.metrics.span();
        let banks = self.banks.lock();
        let observer = cancel.commit_observer();

        if banks.is_empty() {
            Self::notify(observer, None);
            span.finish(false);
            return Ok(());
        }

        tracing::debug!(banks = banks.len(), "commit cycle starting");

        let mut stages = StageList::with_capacity(banks.len());
        let mut prepare_err: Option<CommitError> = None;
        for bank in banks.iter() {
            if let Some(err) = cancel.error() {
                prepare_err = Some(err);
                break;
            }
            match bank.prepare_commit(cancel) {
                Ok(stage) => stages.push(stage),
                Err(err) => {
                    prepare_err = Some(err);
                    break;
                }
            }
        }

        // Cancellation may have landed while the last bank was preparing.
        if prepare_err.is_none() {
            prepare_err = cancel.error();
        }

        if let Some(err) = prepare_err {
            tracing::warn!(error = %err, prepared = stages.len(), "commit cycle rolling back");
            for stage in stages.iter_mut().rev() {
                stage.abort();
            }
            Self::notify(observer, Some(&err));
            span.finish(true);
            return Err(err);
        }

        // The observer sees the about-to-publish moment: all prepares done,
        // nothing visible yet.
        Self::notify(observer, None);

        for stage in &mut stages {
            stage.publish();
        }

        let version = self.version.fetch_add(1, Ordering::Release) + 1;
        tracing::debug!(version, "commit cycle published");
        span.finish(false);
        Ok(())
    }

    fn notify(observer: Option<&CommitObserver>, outcome: Option<&CommitError>) {
        if let Some(observer) = observer {
            observer(outcome);
        }
    }
}

impl std::fmt::Debug for CommitOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitOrchestrator")
            .field("banks", &self.banks.lock().len())
            .field("version", &self.version())
            .finish()
    }
}
