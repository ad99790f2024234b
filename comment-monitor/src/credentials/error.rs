//! Credential pool error types.

use comment_source::SourceError;
use thiserror::Error;

/// Errors surfaced by [`CredentialPool`](super::CredentialPool).
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool was built without any usable credential.
    #[error("No credentials configured")]
    NoCredentials,

    /// Every credential failed with a retryable error during one full rotation.
    #[error("All {attempts} credentials exhausted: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: SourceError,
    },

    /// A failure that rotating accounts cannot fix.
    #[error(transparent)]
    Rejected(SourceError),

    /// The owning session was cancelled before the operation completed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl PoolError {
    /// The remote error behind this failure, if any.
    pub fn source_error(&self) -> Option<&SourceError> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Rejected(err) => Some(err),
            Self::NoCredentials | Self::Cancelled => None,
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}
