//! Error types for the commit pipeline.

/// Errors surfaced by prepare and commit operations.
///
/// Prepare-phase errors terminate the commit cycle and are returned to the
/// caller unchanged, so callers can match on the variant they handed in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// The ambient cancel token was cancelled.
    #[error("commit cancelled")]
    Cancelled,

    /// The ambient cancel token's deadline passed.
    #[error("commit deadline exceeded")]
    DeadlineExceeded,

    /// A bank declined to prepare.
    #[error("bank prepare failed: {0}")]
    PrepareFailed(String),
}

impl CommitError {
    /// Convenience constructor for bank-local prepare failures.
    pub fn prepare_failed(message: impl Into<String>) -> Self {
        Self::PrepareFailed(message.into())
    }

    /// Whether this error originated from the cancel token.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}
