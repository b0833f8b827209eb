//! Segmented queue separating pending (writer-side) from visible
//! (reader-side) values.
//!
//! Writers append to the pending segment, readers pop from the visible
//! segment, and the two only meet at a commit. Commit is modelled as a
//! two-phase operation via [`SegmentedQueue::prepare`]: the prepare phase
//! detaches the current pending segment into a [`StagedSegment`], which is
//! later either published onto the tail of the visible segment or aborted
//! back onto the head of the pending segment. A multi-bank orchestrator can
//! batch prepares across queues before publishing any of them, and an abort
//! restores the detached values so nothing is lost when a later bank fails.
//!
//! Overflow handling runs only during publish. When the merged visible
//! segment exceeds the configured `max_len`, values are dropped according to
//! the configured [`DropPolicy`] before the publish releases its locks.
//!
//! The visible and pending segments take their own locks, so producers and
//! consumers touching different segments do not contend. Prepare, publish,
//! abort, and direct commit additionally serialise against each other
//! through a staging lock. Lock order is always staging, then visible, then
//! pending.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use super::deque::Deque;
use crate::commit::{Bank, CancelToken, CommitError, StagedCommit};

/// How a publish trims the visible segment back to `max_len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Drop from the visible head (oldest values).
    #[default]
    DropOldest,
    /// Drop from the visible tail (newest values).
    DropNewest,
}

struct Shared<T> {
    visible: Mutex<Deque<T>>,
    pending: Mutex<Deque<T>>,
    /// Serialises prepare/publish/abort/commit against one another.
    staging: Mutex<()>,
    /// Visible-length bound enforced at publish. Zero means unbounded.
    max_len: usize,
    drop_policy: DropPolicy,
}

impl<T> Shared<T> {
    fn trim_visible(&self, visible: &mut Deque<T>) {
        if self.max_len == 0 {
            return;
        }
        while visible.len() > self.max_len {
            match self.drop_policy {
                DropPolicy::DropOldest => visible.pop_front(),
                DropPolicy::DropNewest => visible.pop_back(),
            };
        }
    }
}

/// Queue with a pending segment that becomes visible only on commit.
///
/// Handles are cheap to clone and share one underlying queue, so producer,
/// consumer, and committer threads can each hold their own.
pub struct SegmentedQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SegmentedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> SegmentedQueue<T> {
    /// Creates an unbounded queue with empty segments.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a queue with initial contents and a visibility bound.
    #[must_use]
    pub fn builder() -> SegmentedQueueBuilder<T> {
        SegmentedQueueBuilder::default()
    }

    /// Appends a value to the pending segment tail.
    ///
    /// Never blocks on the visible segment.
    pub fn push_back_pending(&self, value: T) {
        self.shared.pending.lock().push_back(value);
    }

    /// Prepends a value to the pending segment head.
    pub fn push_front_pending(&self, value: T) {
        self.shared.pending.lock().push_front(value);
    }

    /// Removes and returns the oldest visible value.
    pub fn pop_front(&self) -> Option<T> {
        self.shared.visible.lock().pop_front()
    }

    /// Removes and returns the newest visible value.
    pub fn pop_back(&self) -> Option<T> {
        self.shared.visible.lock().pop_back()
    }

    /// Current length of the visible segment.
    #[must_use]
    pub fn len_visible(&self) -> usize {
        self.shared.visible.lock().len()
    }

    /// Current length of the pending segment.
    #[must_use]
    pub fn len_pending(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Merges the whole pending segment onto the visible tail immediately.
    ///
    /// Equivalent to a successful [`prepare`](Self::prepare) followed by a
    /// publish, without a cancellation check.
    pub fn commit(&self) {
        let _staging = self.shared.staging.lock();
        let mut visible = self.shared.visible.lock();
        let mut pending = self.shared.pending.lock();
        visible.splice_back(&mut pending);
        self.shared.trim_visible(&mut visible);
    }

    /// Detaches the current pending segment for a two-phase commit.
    ///
    /// Values pushed after `prepare` returns accumulate in a fresh pending
    /// segment and are not part of the returned stage. The stage must be
    /// resolved with [`StagedSegment::publish`] or [`StagedSegment::abort`].
    ///
    /// # Errors
    ///
    /// Returns the token's error when `cancel` is already cancelled; the
    /// pending segment is left untouched in that case.
    pub fn prepare(&self, cancel: &CancelToken) -> Result<StagedSegment<T>, CommitError> {
        if let Some(err) = cancel.error() {
            return Err(err);
        }
        let staged = {
            let _staging = self.shared.staging.lock();
            mem::take(&mut *self.shared.pending.lock())
        };
        Ok(StagedSegment {
            shared: Arc::clone(&self.shared),
            staged,
        })
    }
}

impl<T> Default for SegmentedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SegmentedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedQueue")
            .field("visible", &self.len_visible())
            .field("pending", &self.len_pending())
            .field("max_len", &self.shared.max_len)
            .field("drop_policy", &self.shared.drop_policy)
            .finish()
    }
}

impl<T: Send + 'static> Bank for SegmentedQueue<T> {
    fn prepare_commit(&self, cancel: &CancelToken) -> Result<Box<dyn StagedCommit>, CommitError> {
        let staged = self.prepare(cancel)?;
        Ok(Box::new(staged))
    }
}

/// Builder for [`SegmentedQueue`].
pub struct SegmentedQueueBuilder<T> {
    initial_visible: Vec<T>,
    initial_pending: Vec<T>,
    max_len: usize,
    drop_policy: DropPolicy,
}

impl<T> Default for SegmentedQueueBuilder<T> {
    fn default() -> Self {
        Self {
            initial_visible: Vec::new(),
            initial_pending: Vec::new(),
            max_len: 0,
            drop_policy: DropPolicy::default(),
        }
    }
}

impl<T> SegmentedQueueBuilder<T> {
    /// Seeds the visible segment, front to back.
    ///
    /// Initial contents are not trimmed; the bound applies from the first
    /// publish onwards.
    #[must_use]
    pub fn initial_visible<I: IntoIterator<Item = T>>(mut self, values: I) -> Self {
        self.initial_visible = values.into_iter().collect();
        self
    }

    /// Seeds the pending segment, front to back.
    #[must_use]
    pub fn initial_pending<I: IntoIterator<Item = T>>(mut self, values: I) -> Self {
        self.initial_pending = values.into_iter().collect();
        self
    }

    /// Bounds the visible segment length. Zero means unbounded.
    #[must_use]
    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Selects which end of the visible segment overflow drops from.
    #[must_use]
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the queue.
    #[must_use]
    pub fn build(self) -> SegmentedQueue<T> {
        SegmentedQueue {
            shared: Arc::new(Shared {
                visible: Mutex::new(self.initial_visible.into_iter().collect()),
                pending: Mutex::new(self.initial_pending.into_iter().collect()),
                staging: Mutex::new(()),
                max_len: self.max_len,
                drop_policy: self.drop_policy,
            }),
        }
    }
}

/// A pending segment detached by [`SegmentedQueue::prepare`], awaiting
/// publish or abort.
///
/// Publish and abort are idempotent and mutually exclusive: the first call
/// drains the staged values, so whichever runs second observes an empty
/// stage and does nothing.
pub struct StagedSegment<T> {
    shared: Arc<Shared<T>>,
    staged: Deque<T>,
}

impl<T> StagedSegment<T> {
    /// Number of staged values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Whether the stage has been consumed or was empty to begin with.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Splices the staged values onto the visible tail, in staged order,
    /// then enforces the visible-length bound.
    pub fn publish(&mut self) {
        if self.staged.is_empty() {
            return;
        }
        let _staging = self.shared.staging.lock();
        let mut visible = self.shared.visible.lock();
        visible.splice_back(&mut self.staged);
        self.shared.trim_visible(&mut visible);
    }

    /// Restores the staged values onto the head of the current pending
    /// segment, preserving their original order ahead of any values pushed
    /// since the prepare.
    pub fn abort(&mut self) {
        if self.staged.is_empty() {
            return;
        }
        let _staging = self.shared.staging.lock();
        let mut pending = self.shared.pending.lock();
        pending.splice_front(&mut self.staged);
    }
}

impl<T> std::fmt::Debug for StagedSegment<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedSegment")
            .field("staged", &self.staged.len())
            .finish()
    }
}

impl<T: Send> StagedCommit for StagedSegment<T> {
    fn publish(&mut self) {
        StagedSegment::publish(self);
    }

    fn abort(&mut self) {
        StagedSegment::abort(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn drain_visible<T>(queue: &SegmentedQueue<T>) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = queue.pop_front() {
            values.push(value);
        }
        values
    }

    #[test]
    fn test_basic_operations() {
        let queue = SegmentedQueue::builder()
            .initial_visible([1, 2])
            .initial_pending([3])
            .build();

        assert_eq!(queue.len_visible(), 2);
        assert_eq!(queue.pop_front(), Some(1));
        assert_eq!(queue.pop_back(), Some(2));
        assert_eq!(queue.pop_front(), None);

        queue.push_front_pending(5);
        queue.push_back_pending(6);
        assert_eq!(queue.len_visible(), 0, "pending stays invisible before commit");

        queue.commit();

        assert_eq!(queue.len_visible(), 3);
        assert_eq!(drain_visible(&queue), vec![5, 3, 6]);
    }

    #[test]
    fn test_commit_overflow_drop_oldest() {
        let queue = SegmentedQueue::builder()
            .initial_visible([1, 2])
            .max_len(3)
            .drop_policy(DropPolicy::DropOldest)
            .build();

        queue.push_back_pending(3);
        queue.push_back_pending(4);
        queue.commit();

        assert_eq!(drain_visible(&queue), vec![2, 3, 4]);
    }

    #[test]
    fn test_commit_overflow_drop_newest() {
        let queue = SegmentedQueue::builder()
            .initial_visible([1, 2])
            .max_len(3)
            .drop_policy(DropPolicy::DropNewest)
            .build();

        queue.push_back_pending(3);
        queue.push_back_pending(4);
        queue.commit();

        assert_eq!(drain_visible(&queue), vec![1, 2, 3]);
    }

    #[test]
    fn test_prepare_abort_restores_pending() {
        let queue = SegmentedQueue::new();
        queue.push_back_pending(1);
        queue.push_back_pending(2);

        let mut staged = queue.prepare(&CancelToken::new()).unwrap();
        queue.push_back_pending(3);
        staged.abort();

        assert_eq!(queue.len_visible(), 0, "abort must not touch the visible segment");
        assert_eq!(queue.len_pending(), 3);

        queue.commit();
        assert_eq!(drain_visible(&queue), vec![1, 2, 3]);
    }

    #[test]
    fn test_publish_excludes_pushes_after_prepare() {
        let queue = SegmentedQueue::new();
        queue.push_back_pending(10);
        queue.push_back_pending(11);

        let mut staged = queue.prepare(&CancelToken::new()).unwrap();
        queue.push_back_pending(12);
        staged.publish();

        assert_eq!(drain_visible(&queue), vec![10, 11]);

        queue.commit();
        assert_eq!(queue.pop_front(), Some(12));
    }

    #[test]
    fn test_prepare_on_cancelled_token_keeps_pending() {
        let queue = SegmentedQueue::new();
        queue.push_back_pending(1);

        let cancel = CancelToken::new();
        cancel.cancel();

        let err = queue.prepare(&cancel).unwrap_err();
        assert!(matches!(err, CommitError::Cancelled));
        assert_eq!(queue.len_pending(), 1);

        queue.commit();
        assert_eq!(queue.pop_front(), Some(1));
    }

    #[test]
    fn test_publish_is_idempotent() {
        let queue = SegmentedQueue::new();
        queue.push_back_pending(42);

        let mut staged = queue.prepare(&CancelToken::new()).unwrap();
        staged.publish();
        assert_eq!(queue.len_visible(), 1);

        staged.publish();
        assert_eq!(queue.len_visible(), 1);
    }

    #[test]
    fn test_abort_is_idempotent() {
        let queue = SegmentedQueue::new();
        queue.push_back_pending(1);

        let mut staged = queue.prepare(&CancelToken::new()).unwrap();
        staged.abort();
        staged.abort();

        assert_eq!(queue.len_pending(), 1);
    }

    #[test]
    fn test_abort_after_publish_is_noop() {
        let queue = SegmentedQueue::new();
        queue.push_back_pending(7);

        let mut staged = queue.prepare(&CancelToken::new()).unwrap();
        staged.publish();
        staged.abort();

        assert_eq!(queue.len_visible(), 1);
        assert_eq!(queue.len_pending(), 0);
    }

    #[test]
    fn test_abort_restores_when_pending_empty() {
        let queue = SegmentedQueue::new();
        queue.push_back_pending(7);
        queue.push_back_pending(8);

        let mut staged = queue.prepare(&CancelToken::new()).unwrap();
        staged.abort();

        assert_eq!(queue.len_visible(), 0);
        assert_eq!(queue.pop_front(), None);
        assert_eq!(queue.len_pending(), 2);
    }

    #[test]
    fn test_push_front_pending_on_empty_queue() {
        let queue = SegmentedQueue::new();
        queue.push_front_pending(1);
        assert_eq!(queue.len_visible(), 0);

        let staged = queue.prepare(&CancelToken::new()).unwrap();
        assert_eq!(staged.len(), 1);
    }

    #[test]
    fn test_prepare_with_empty_pending_yields_empty_stage() {
        let queue = SegmentedQueue::<i32>::new();
        let mut staged = queue.prepare(&CancelToken::new()).unwrap();
        assert!(staged.is_empty());

        staged.publish();
        assert_eq!(queue.len_visible(), 0);
    }

    #[test]
    fn test_pop_back_on_empty() {
        let queue: SegmentedQueue<i32> = SegmentedQueue::new();
        assert_eq!(queue.pop_back(), None);
    }

    #[test]
    fn test_concurrent_producers_consumers_and_committer() {
        const TOTAL: usize = 500;
        const WRITERS: usize = 4;
        const READERS: usize = 4;

        let queue = SegmentedQueue::new();
        let produced = Arc::new(AtomicUsize::new(0));
        let consumed = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(vec![false; TOTAL]));

        let mut handles = Vec::new();

        for _ in 0..WRITERS {
            let queue = queue.clone();
            let produced = Arc::clone(&produced);
            handles.push(thread::spawn(move || loop {
                let next = produced.fetch_add(1, Ordering::SeqCst);
                if next >= TOTAL {
                    return;
                }
                queue.push_back_pending(next);
                thread::yield_now();
            }));
        }

        for _ in 0..READERS {
            let queue = queue.clone();
            let consumed = Arc::clone(&consumed);
            let seen = Arc::clone(&seen);
            handles.push(thread::spawn(move || loop {
                if consumed.load(Ordering::SeqCst) >= TOTAL {
                    return;
                }
                if let Some(value) = queue.pop_front() {
                    let mut seen = seen.lock();
                    assert!(!seen[value], "value {value} consumed twice");
                    seen[value] = true;
                    drop(seen);
                    consumed.fetch_add(1, Ordering::SeqCst);
                } else {
                    thread::yield_now();
                }
            }));
        }

        {
            let queue = queue.clone();
            let consumed = Arc::clone(&consumed);
            handles.push(thread::spawn(move || {
                while consumed.load(Ordering::SeqCst) < TOTAL {
                    queue.commit();
                    thread::yield_now();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        queue.commit();
        assert_eq!(queue.pop_front(), None, "queue should be fully drained");
        let seen = seen.lock();
        assert!(seen.iter().all(|&observed| observed), "every value must be consumed");
    }
}
