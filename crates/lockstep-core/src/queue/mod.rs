//! # Queue Primitives
//!
//! Two committable queue flavors over one arena-backed [`Deque`]:
//!
//! - [`SegmentedQueue`]: pending and visible segments with two-phase
//!   prepare/publish/abort. Implements [`Bank`](crate::commit::Bank), so it
//!   plugs straight into the multi-bank orchestrator. Overflow is enforced
//!   at publish.
//! - [`CommitQueue`]: single-partition variant with a commit barrier and
//!   overflow enforced at push. Does not take part in orchestration.

mod bounded;
mod deque;
mod segmented;

pub use bounded::{CommitQueue, OverflowPolicy, QueueError};
pub use deque::{Deque, Iter};
pub use segmented::{DropPolicy, SegmentedQueue, SegmentedQueueBuilder, StagedSegment};
