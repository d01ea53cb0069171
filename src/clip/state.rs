//! Terminal clip states and per-tile outcomes.

use std::fmt;
use std::path::PathBuf;

/// Status code recorded for tiles whose clip already existed on disk.
pub const SKIPPED_STATUS_CODE: u16 = 888;

/// Status code the clips endpoint returns when the tile footprint is not
/// covered by the requested image.
pub const BOUNDARY_STATUS_CODE: u16 = 400;

/// Terminal state of one tile's clip.
///
/// A tile moves from pending to either [`SkippedExisting`](Self::SkippedExisting)
/// or a requested clip job; a requested job is polled until it ends in one of
/// the remaining states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipState {
    /// The output file already existed; no request was made.
    SkippedExisting,
    /// The clip was prepared and downloaded.
    Succeeded,
    /// The clips endpoint rejected the footprint as out of bounds.
    FailedBoundary,
    /// The job did not finish within the poll budget; no file was written.
    TimedOut,
    /// Any other error (non-429 prepare error, download error, missing image
    /// id, panicked task). Recorded for follow-up; not retried.
    Failed,
}

impl ClipState {
    /// Upper-case name written to the ledger.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SkippedExisting => "SKIPPED_EXISTING",
            Self::Succeeded => "SUCCEEDED",
            Self::FailedBoundary => "FAILED_BOUNDARY",
            Self::TimedOut => "TIMED_OUT",
            Self::Failed => "FAILED",
        }
    }

    /// True when the clip is on disk after the run.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::SkippedExisting | Self::Succeeded)
    }
}

impl fmt::Display for ClipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of driving one tile through the clip state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipOutcome {
    /// Terminal state.
    pub state: ClipState,
    /// Status code recorded in the ledger (see [`ClipOutcome::ledger_status_code`]).
    pub status_code: Option<u16>,
    /// Output path, when the tile had enough information to compute one.
    pub path: Option<PathBuf>,
    /// Error description for non-success states.
    pub detail: Option<String>,
}

impl ClipOutcome {
    /// Output file already present.
    #[must_use]
    pub fn skipped(path: PathBuf) -> Self {
        Self {
            state: ClipState::SkippedExisting,
            status_code: Some(SKIPPED_STATUS_CODE),
            path: Some(path),
            detail: None,
        }
    }

    /// Clip downloaded; `prepare_status` is the clip-prepare response code.
    #[must_use]
    pub fn succeeded(path: PathBuf, prepare_status: u16) -> Self {
        Self {
            state: ClipState::Succeeded,
            status_code: Some(prepare_status),
            path: Some(path),
            detail: None,
        }
    }

    /// Footprint out of bounds for the resolved image.
    #[must_use]
    pub fn boundary(path: PathBuf, status: u16, detail: impl Into<String>) -> Self {
        Self {
            state: ClipState::FailedBoundary,
            status_code: Some(status),
            path: Some(path),
            detail: Some(detail.into()),
        }
    }

    /// Poll budget exhausted.
    #[must_use]
    pub fn timed_out(path: PathBuf, prepare_status: u16, attempts: u32) -> Self {
        Self {
            state: ClipState::TimedOut,
            status_code: Some(prepare_status),
            path: Some(path),
            detail: Some(format!("clip not ready after {attempts} status polls")),
        }
    }

    /// Any other failure.
    #[must_use]
    pub fn failed(path: Option<PathBuf>, status: Option<u16>, detail: impl Into<String>) -> Self {
        Self {
            state: ClipState::Failed,
            status_code: status,
            path,
            detail: Some(detail.into()),
        }
    }

    /// Status code for the ledger: the recorded code, or 0 when none exists.
    #[must_use]
    pub fn ledger_status_code(&self) -> u16 {
        self.status_code.unwrap_or(0)
    }
}
