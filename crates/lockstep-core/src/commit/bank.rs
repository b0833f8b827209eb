//! The bank capability: what a partition implements to take part in a
//! multi-bank commit.
//!
//! A bank's [`prepare_commit`](Bank::prepare_commit) either hands back a
//! [`StagedCommit`] (the partition's not-yet-visible state, ready to be
//! published or abandoned) or an error, in which case the bank must be left
//! as if no prepare had happened. The orchestrator publishes every stage in
//! registration order on success, or aborts the collected stages in reverse
//! order on failure.

use super::cancel::CancelToken;
use super::error::CommitError;

/// Staged state held between a successful prepare and its resolution.
///
/// Exactly one of `publish` or `abort` is invoked per commit cycle. Both
/// must be idempotent, and the first call consumes the stage: whichever
/// runs second must observe an empty stage and do nothing.
pub trait StagedCommit: Send {
    /// Makes the staged state visible to readers.
    ///
    /// Publishes are infallible by contract; a panic here is a programmer
    /// error and propagates to the committer.
    fn publish(&mut self);

    /// Abandons the staged state, restoring it for a later attempt.
    fn abort(&mut self);
}

impl std::fmt::Debug for dyn StagedCommit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn StagedCommit")
    }
}

/// A partition that can take part in an orchestrated commit.
///
/// Contract:
///
/// - `prepare_commit` is called while the orchestrator holds its writer
///   lock; it must not call back into the orchestrator.
/// - Implementations should check `cancel` and may return its error
///   directly.
/// - On error the bank is considered un-prepared: neither `publish` nor
///   `abort` will be invoked for it.
pub trait Bank: Send + Sync {
    /// Stages this bank's pending state for an atomic publish.
    ///
    /// # Errors
    ///
    /// Returns the cancel token's error when the cycle is already cancelled,
    /// or a bank-local error; either way the commit cycle stops and
    /// previously prepared banks are rolled back.
    fn prepare_commit(&self, cancel: &CancelToken) -> Result<Box<dyn StagedCommit>, CommitError>;
}

type Callback = Box<dyn FnOnce() + Send>;

/// [`StagedCommit`] assembled from optional one-shot closures.
///
/// An absent closure is a no-op, which is how a bank with nothing to
/// publish (or nothing to restore) participates. The first invocation of
/// either method consumes both closures, so publish-then-abort and repeated
/// calls are all no-ops.
#[derive(Default)]
pub struct StagedCallbacks {
    publish: Option<Callback>,
    abort: Option<Callback>,
}

impl StagedCallbacks {
    /// Creates a stage where both publish and abort are no-ops.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the publish action.
    #[must_use]
    pub fn on_publish<F: FnOnce() + Send + 'static>(mut self, publish: F) -> Self {
        self.publish = Some(Box::new(publish));
        self
    }

    /// Sets the abort action.
    #[must_use]
    pub fn on_abort<F: FnOnce() + Send + 'static>(mut self, abort: F) -> Self {
        self.abort = Some(Box::new(abort));
        self
    }

    /// Boxes the stage for returning from [`Bank::prepare_commit`].
    #[must_use]
    pub fn boxed(self) -> Box<dyn StagedCommit> {
        Box::new(self)
    }
}

impl StagedCommit for StagedCallbacks {
    fn publish(&mut self) {
        self.abort = None;
        if let Some(publish) = self.publish.take() {
            publish();
        }
    }

    fn abort(&mut self) {
        self.publish = None;
        if let Some(abort) = self.abort.take() {
            abort();
        }
    }
}

impl std::fmt::Debug for StagedCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedCallbacks")
            .field("publish", &self.publish.is_some())
            .field("abort", &self.abort.is_some())
            .finish()
    }
}

/// Adapter turning a prepare closure into a [`Bank`].
///
/// Mostly useful for fixtures and tests; real partitions implement
/// [`Bank`] directly.
pub struct BankFn<F>(F);

/// Wraps a prepare closure as a [`Bank`].
pub fn bank_fn<F>(prepare: F) -> BankFn<F>
where
    F: Fn(&CancelToken) -> Result<Box<dyn StagedCommit>, CommitError> + Send + Sync,
{
    BankFn(prepare)
}

impl<F> Bank for BankFn<F>
where
    F: Fn(&CancelToken) -> Result<Box<dyn StagedCommit>, CommitError> + Send + Sync,
{
    fn prepare_commit(&self, cancel: &CancelToken) -> Result<Box<dyn StagedCommit>, CommitError> {
        (self.0)(cancel)
    }
}

impl<F> std::fmt::Debug for BankFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankFn").finish_non_exhaustive()
    }
}
