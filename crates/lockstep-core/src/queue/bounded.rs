//! Bounded queue with a commit barrier between writer and reader.
//!
//! Unlike the segmented queue, this variant enforces its bound at push time
//! and keeps everything in one structure: values enter an uncommitted
//! segment, [`CommitQueue::commit`] moves them wholesale into the committed
//! segment, and readers only ever pop committed values. It is a
//! single-partition convenience and does not take part in multi-bank
//! orchestration.

use parking_lot::RwLock;

use super::deque::Deque;

/// How a push behaves once the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Reject the push with [`QueueError::Full`].
    #[default]
    Error,
    /// Evict the oldest value (committed head first) to make room.
    DropOldest,
    /// Discard the value being pushed.
    DropNewest,
}

/// Errors surfaced by [`CommitQueue`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue is at capacity and the overflow policy is
    /// [`OverflowPolicy::Error`].
    #[error("queue is full")]
    Full,
}

struct Segments<T> {
    committed: Deque<T>,
    uncommitted: Deque<T>,
}

impl<T> Segments<T> {
    fn len(&self) -> usize {
        self.committed.len() + self.uncommitted.len()
    }
}

/// Committable queue bounded to `max_len` values in total.
///
/// A `max_len` of zero means the queue grows without bound.
pub struct CommitQueue<T> {
    segments: RwLock<Segments<T>>,
    max_len: usize,
    policy: OverflowPolicy,
}

impl<T> CommitQueue<T> {
    /// Creates a queue with the given capacity and overflow policy.
    #[must_use]
    pub fn new(max_len: usize, policy: OverflowPolicy) -> Self {
        Self {
            segments: RwLock::new(Segments {
                committed: Deque::new(),
                uncommitted: Deque::new(),
            }),
            max_len,
            policy,
        }
    }

    /// Total number of values, committed and uncommitted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.read().len()
    }

    /// Whether the queue holds no values at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of values available to the reader.
    #[must_use]
    pub fn committed_len(&self) -> usize {
        self.segments.read().committed.len()
    }

    /// Number of values still awaiting a commit.
    #[must_use]
    pub fn uncommitted_len(&self) -> usize {
        self.segments.read().uncommitted.len()
    }

    /// Appends a value on the writer side.
    ///
    /// The returned flag reports whether a value was dropped to satisfy the
    /// bound: under [`OverflowPolicy::DropOldest`] the overall head is
    /// evicted, under [`OverflowPolicy::DropNewest`] the pushed value itself
    /// is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] when the queue is at capacity under
    /// [`OverflowPolicy::Error`]; the queue is left unchanged.
    pub fn push(&self, value: T) -> Result<bool, QueueError> {
        let mut segments = self.segments.write();

        let mut dropped = false;
        if self.max_len > 0 && segments.len() >= self.max_len {
            match self.policy {
                OverflowPolicy::Error => return Err(QueueError::Full),
                OverflowPolicy::DropNewest => return Ok(true),
                OverflowPolicy::DropOldest => {
                    if segments.committed.pop_front().is_none() {
                        segments.uncommitted.pop_front();
                    }
                    dropped = true;
                }
            }
        }

        segments.uncommitted.push_back(value);
        Ok(dropped)
    }

    /// Moves every uncommitted value into the committed segment.
    ///
    /// Returns the number of values that became visible to the reader.
    pub fn commit(&self) -> usize {
        let mut segments = self.segments.write();
        let moved = segments.uncommitted.len();
        if moved == 0 {
            return 0;
        }
        let Segments {
            committed,
            uncommitted,
        } = &mut *segments;
        committed.splice_back(uncommitted);
        moved
    }

    /// Removes and returns the oldest committed value.
    pub fn pop_front(&self) -> Option<T> {
        self.segments.write().committed.pop_front()
    }

    /// Removes and returns the newest committed value, skipping any
    /// uncommitted tail.
    pub fn pop_back(&self) -> Option<T> {
        self.segments.write().committed.pop_back()
    }
}

impl<T: Clone> CommitQueue<T> {
    /// Copies the committed values in order, for inspection.
    #[must_use]
    pub fn snapshot_committed(&self) -> Vec<T> {
        self.segments.read().committed.iter().cloned().collect()
    }
}

impl<T> std::fmt::Debug for CommitQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let segments = self.segments.read();
        f.debug_struct("CommitQueue")
            .field("committed", &segments.committed.len())
            .field("uncommitted", &segments.uncommitted.len())
            .field("max_len", &self.max_len)
            .field("policy", &self.policy)
            .finish()
    }
}
