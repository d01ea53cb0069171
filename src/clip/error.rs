//! Error type for the clip phase.

use std::path::PathBuf;

use crate::pool::{MAX_CONCURRENCY, MIN_CONCURRENCY};

/// Errors raised by the clip phase.
///
/// [`DownloadOrchestrator::download_all`](super::DownloadOrchestrator::download_all)
/// only returns the pool-level variants; per-tile errors become
/// [`ClipState::Failed`](super::ClipState::Failed) ledger entries.
#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    /// The tile was never resolved to an image.
    #[error("tile {box_id} has no image id; resolve tiles before downloading")]
    MissingImageId {
        /// Identifier of the unresolved tile.
        box_id: String,
    },

    /// Checking for an existing output file failed.
    #[error("IO error checking {path}: {source}")]
    Io {
        /// The file path being checked.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

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

impl ClipError {
    /// Creates a missing image id error.
    pub fn missing_image_id(box_id: impl Into<String>) -> Self {
        Self::MissingImageId { box_id: box_id.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_image_id_names_tile() {
        let msg = ClipError::missing_image_id("tile-0003").to_string();
        assert!(msg.contains("tile-0003"), "Expected box id in: {msg}");
        assert!(msg.contains("no image id"));
    }

    #[test]
    fn test_invalid_concurrency_display() {
        let msg = ClipError::InvalidConcurrency { value: 500 }.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("between 1 and 100"));
    }
}
