//! # Lockstep Core
//!
//! In-process coordination primitives that let independently managed data
//! partitions ("banks") advance their externally visible state in lockstep.
//!
//! Two pieces fit together:
//!
//! - **Segmented queues** separate pending (writer-side) values from
//!   visible (reader-side) values, with prepare/publish/abort staging.
//! - **The commit orchestrator** runs a two-phase protocol across any
//!   number of banks under one writer lock, publishing a new monotonic
//!   version on success and rolling staged state back on failure.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    CommitOrchestrator                     │
//! │   writer lock ─ prepare* ─ publish* ─ version += 1        │
//! │       │              │         │                          │
//! │       ▼              ▼         ▼                          │
//! │  ┌─────────┐    ┌─────────┐   ┌─────────┐                 │
//! │  │ Bank A  │    │ Bank B  │   │ Bank C  │   (any order,   │
//! │  │ pending │    │ pending │   │ pending │    any type)    │
//! │  │ visible │    │ visible │   │ visible │                 │
//! │  └─────────┘    └─────────┘   └─────────┘                 │
//! │       ▲              ▲         ▲                          │
//! │    writers push   readers pop  readers never see a        │
//! │    pending        visible      partial cross-bank commit  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Readers never block on writers: they observe either the pre-commit or
//! the post-commit snapshot of every bank, never a mixture.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use lockstep_core::{Bank, CancelToken, CommitOrchestrator, SegmentedQueue};
//!
//! let left = SegmentedQueue::new();
//! let right = SegmentedQueue::new();
//! left.push_back_pending("l1");
//! right.push_back_pending("r1");
//!
//! let banks: Vec<Arc<dyn Bank>> = vec![Arc::new(left.clone()), Arc::new(right.clone())];
//! let orchestrator = CommitOrchestrator::new(banks);
//!
//! // Nothing is visible until both banks publish atomically.
//! assert_eq!(left.len_visible(), 0);
//! orchestrator.commit_all(&CancelToken::new()).unwrap();
//!
//! assert_eq!(orchestrator.version(), 1);
//! assert_eq!(left.pop_front(), Some("l1"));
//! assert_eq!(right.pop_front(), Some("r1"));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod commit;
pub mod queue;

pub use commit::{Bank, CancelToken, CommitError, CommitOrchestrator, StagedCommit};
pub use queue::{CommitQueue, DropPolicy, OverflowPolicy, SegmentedQueue};
