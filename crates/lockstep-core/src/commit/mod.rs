//! # Multi-Bank Commit
//!
//! Two-phase commit across independently managed partitions ("banks"):
//!
//! 1. **Prepare**: each bank detaches its pending state into a
//!    [`StagedCommit`], in registration order, under the orchestrator's
//!    writer lock.
//! 2. **Publish or abort**: once every bank has prepared, all stages are
//!    published in order and the orchestrator's version advances by one.
//!    If any prepare fails, or the ambient [`CancelToken`] fires, the
//!    stages collected so far are aborted in reverse order instead.
//!
//! Multi-register readers rely on the version: two reads that observe the
//! same version saw a single consistent cross-bank snapshot.

mod bank;
mod cancel;
mod error;
mod orchestrator;

pub use bank::{bank_fn, Bank, BankFn, StagedCallbacks, StagedCommit};
pub use cancel::{CancelToken, CommitObserver};
pub use error::CommitError;
pub use orchestrator::CommitOrchestrator;
