//! Ambient cancellation for commit cycles.
//!
//! A [`CancelToken`] is the context value threaded through
//! [`commit_all`](super::CommitOrchestrator::commit_all) and every bank's
//! prepare. It answers two questions: has this cycle been called off
//! (explicit cancellation or an expired deadline), and is there a commit
//! observer to notify with the cycle's outcome.
//!
//! Tokens derive: [`with_deadline`](CancelToken::with_deadline),
//! [`with_timeout`](CancelToken::with_timeout), and
//! [`with_commit_observer`](CancelToken::with_commit_observer) each return a
//! child token. Cancelling an ancestor reaches every descendant; cancelling
//! a child leaves its ancestors untouched. Clones of a token share one
//! cancellation scope.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::CommitError;

/// One-shot outcome callback for a commit cycle.
///
/// Receives `None` on success (strictly before any bank publishes) and
/// `Some(error)` on failure (strictly after all aborts have run).
pub type CommitObserver = Arc<dyn Fn(Option<&CommitError>) + Send + Sync>;

#[derive(Default)]
struct CancelScope {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<Arc<CancelScope>>,
}

/// Cancellation token carried through a commit cycle.
#[derive(Clone, Default)]
pub struct CancelToken {
    scope: Arc<CancelScope>,
    observer: Option<CommitObserver>,
}

impl CancelToken {
    /// Creates a live token with no deadline and no observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels this token's scope and every scope derived from it.
    pub fn cancel(&self) {
        self.scope.cancelled.store(true, Ordering::Release);
    }

    /// Whether the token is cancelled or past its deadline.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.error().is_some()
    }

    /// The cancellation error to report, if any.
    ///
    /// Explicit cancellation takes precedence over an expired deadline when
    /// both apply to the same scope. Ancestor scopes are consulted in order.
    #[must_use]
    pub fn error(&self) -> Option<CommitError> {
        let mut node = Some(&self.scope);
        while let Some(scope) = node {
            if scope.cancelled.load(Ordering::Acquire) {
                return Some(CommitError::Cancelled);
            }
            if let Some(deadline) = scope.deadline {
                if Instant::now() >= deadline {
                    return Some(CommitError::DeadlineExceeded);
                }
            }
            node = scope.parent.as_ref();
        }
        None
    }

    /// Derives a child token that additionally expires at `deadline`.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            scope: self.child_scope(Some(deadline)),
            observer: self.observer.clone(),
        }
    }

    /// Derives a child token that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child token carrying `observer` as its commit observer.
    ///
    /// At most one observer rides a token; a later binding shadows an
    /// earlier one. The orchestrator resolves the observer once per cycle
    /// and invokes it exactly once.
    #[must_use]
    pub fn with_commit_observer<F>(&self, observer: F) -> Self
    where
        F: Fn(Option<&CommitError>) + Send + Sync + 'static,
    {
        Self {
            scope: self.child_scope(None),
            observer: Some(Arc::new(observer)),
        }
    }

    pub(crate) fn commit_observer(&self) -> Option<&CommitObserver> {
        self.observer.as_ref()
    }

    fn child_scope(&self, deadline: Option<Instant>) -> Arc<CancelScope> {
        Arc::new(CancelScope {
            cancelled: AtomicBool::new(false),
            deadline,
            parent: Some(Arc::clone(&self.scope)),
        })
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.scope.deadline)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_fresh_token_is_live() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.error(), None);
    }

    #[test]
    fn test_cancel_reports_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.error(), Some(CommitError::Cancelled));
    }

    #[test]
    fn test_clone_shares_scope() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_expired_deadline_reports_deadline_error() {
        let token = CancelToken::new().with_timeout(Duration::ZERO);
        assert_eq!(token.error(), Some(CommitError::DeadlineExceeded));
    }

    #[test]
    fn test_future_deadline_is_live() {
        let token = CancelToken::new().with_timeout(Duration::from_secs(3600));
        assert_eq!(token.error(), None);
    }

    #[test]
    fn test_cancel_beats_deadline_in_same_scope() {
        let token = CancelToken::new().with_timeout(Duration::ZERO);
        token.cancel();
        assert_eq!(token.error(), Some(CommitError::Cancelled));
    }

    #[test]
    fn test_parent_cancellation_reaches_child() {
        let parent = CancelToken::new();
        let child = parent.with_timeout(Duration::from_secs(3600));
        parent.cancel();
        assert_eq!(child.error(), Some(CommitError::Cancelled));
    }

    #[test]
    fn test_child_cancellation_spares_parent() {
        let parent = CancelToken::new();
        let child = parent.with_commit_observer(|_| {});
        child.cancel();
        assert!(!parent.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_observer_is_carried_and_shadowed() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));

        let token = {
            let first_calls = Arc::clone(&first_calls);
            CancelToken::new().with_commit_observer(move |_| {
                first_calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(token.commit_observer().is_some());

        let shadowed = {
            let second_calls = Arc::clone(&second_calls);
            token.with_commit_observer(move |_| {
                second_calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        if let Some(observer) = shadowed.commit_observer() {
            observer(None);
        }
        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deadline_survives_observer_derivation() {
        let token = CancelToken::new()
            .with_timeout(Duration::ZERO)
            .with_commit_observer(|_| {});
        assert_eq!(token.error(), Some(CommitError::DeadlineExceeded));
    }
}
