//! Error type for the resolution phase.

use crate::pool::{MAX_CONCURRENCY, MIN_CONCURRENCY};

/// Errors that abort a whole resolution run.
///
/// Per-tile failures never surface here; they are recorded as
/// [`ResolveOutcome::Failed`](super::ResolveOutcome::Failed).
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Invalid concurrency value provided.
    #[error("invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}")]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_display() {
        let msg = ResolveError::InvalidConcurrency { value: 0 }.to_string();
        assert!(msg.contains("invalid concurrency"));
        assert!(msg.contains("100"));
    }
}
