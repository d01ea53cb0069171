//! Clip preparation and download for resolved tiles.
//!
//! [`DownloadOrchestrator`] asks the clips endpoint to cut each tile out of
//! its resolved image, polls the job until it is ready, and streams the
//! archive to a deterministic path from [`ClipPaths`]. Tiles whose archive
//! already exists are skipped without any request, so a run can be repeated
//! until every tile is on disk.

mod error;
mod orchestrator;
mod paths;
mod state;

pub use error::ClipError;
pub use orchestrator::{DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL, DownloadOrchestrator, PollSettings};
pub use paths::ClipPaths;
pub use state::{BOUNDARY_STATUS_CODE, ClipOutcome, ClipState, SKIPPED_STATUS_CODE};
