//! Concurrent clip preparation, polling and download.
//!
//! Per tile the orchestrator runs:
//!
//! ```text
//! pending ─┬─> SKIPPED_EXISTING                      (output file present, no I/O)
//!          └─> requested ─┬─> FAILED_BOUNDARY        (HTTP 400, not retried)
//!                         ├─> FAILED                 (other prepare error)
//!                         └─> polling ─┬─> SUCCEEDED (file downloaded)
//!                                      ├─> FAILED    (no result link, download error)
//!                                      └─> TIMED_OUT (poll budget exhausted)
//! ```
//!
//! Rate-limited requests (429) at any step are retried with backoff before
//! the state machine sees them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::{BOUNDARY_STATUS_CODE, ClipError, ClipOutcome, ClipPaths, ClipState};
use crate::api::{ClipRequest, ClipTarget, PlanetClient, RetryPolicy};
use crate::geo::GeoBox;
use crate::ledger::{DownloadLedger, LedgerEntry};
use crate::pool::is_valid_concurrency;

/// Default delay between status polls (1 second).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of status polls before giving up (60).
pub const DEFAULT_POLL_ATTEMPTS: u32 = 60;

/// How often and how long to poll a clip job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Sleep before each status request.
    pub interval: Duration,
    /// Number of status requests before the tile is marked timed out.
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

impl PollSettings {
    /// Creates poll settings; `max_attempts` is raised to at least 1.
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }
}

/// Drives every resolved tile through the clip state machine with a bounded
/// worker pool.
///
/// # Concurrency Model
///
/// - Each tile runs in its own Tokio task and is owned by that task alone
/// - A semaphore permit is acquired before spawning each task
/// - A failing or panicking task becomes that tile's [`ClipState::Failed`]
///   entry and never affects its siblings
#[derive(Debug)]
pub struct DownloadOrchestrator {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_policy: RetryPolicy,
    poll: PollSettings,
    paths: Arc<ClipPaths>,
}

impl DownloadOrchestrator {
    /// Creates an orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug", skip(retry_policy, paths))]
    pub fn new(
        concurrency: usize,
        retry_policy: RetryPolicy,
        poll: PollSettings,
        paths: ClipPaths,
    ) -> Result<Self, ClipError> {
        if !is_valid_concurrency(concurrency) {
            return Err(ClipError::InvalidConcurrency { value: concurrency });
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
            poll,
            paths: Arc::new(paths),
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the poll settings.
    #[must_use]
    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    /// Returns the output path resolver.
    #[must_use]
    pub fn paths(&self) -> &ClipPaths {
        &self.paths
    }

    /// Downloads every tile and returns the ledger, one entry per input tile
    /// in input order.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::SemaphoreClosed`] if the semaphore is closed.
    /// Individual tile failures (including missing image ids) do NOT cause
    /// this method to error.
    #[instrument(skip(self, client, tiles), fields(tiles = tiles.len(), concurrency = self.concurrency))]
    pub async fn download_all(&self, client: &PlanetClient, tiles: Vec<GeoBox>) -> Result<DownloadLedger, ClipError> {
        info!(output_dir = %self.paths.output_dir().display(), "starting clip downloads");
        let mut handles = Vec::with_capacity(tiles.len());

        for tile in tiles {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ClipError::SemaphoreClosed)?;

            let client = client.clone();
            let retry_policy = self.retry_policy.clone();
            let poll = self.poll;
            let paths = Arc::clone(&self.paths);
            let fallback = tile.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = match clip_tile(&client, &tile, &retry_policy, poll, &paths).await {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        warn!(box_id = %tile.id(), error = %error, "clip failed before any request");
                        ClipOutcome::failed(None, None, error.to_string())
                    }
                };
                LedgerEntry { tile, outcome }
            });
            handles.push((fallback, handle));
        }

        debug!(task_count = handles.len(), "waiting for clips to complete");

        let mut entries = Vec::with_capacity(handles.len());
        for (fallback, handle) in handles {
            let entry = match handle.await {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(box_id = %fallback.id(), error = %e, "clip task panicked");
                    LedgerEntry {
                        tile: fallback,
                        outcome: ClipOutcome::failed(None, None, format!("clip task failed: {e}")),
                    }
                }
            };
            entries.push(entry);
        }
        let ledger = DownloadLedger::new(entries);

        info!(
            succeeded = ledger.count(ClipState::Succeeded),
            skipped = ledger.count(ClipState::SkippedExisting),
            boundary = ledger.count(ClipState::FailedBoundary),
            timed_out = ledger.count(ClipState::TimedOut),
            failed = ledger.count(ClipState::Failed),
            "clip downloads complete"
        );
        Ok(ledger)
    }

    /// Drives a single tile through the state machine.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::MissingImageId`] before any I/O when the tile was
    /// never resolved, and [`ClipError::Io`] if the output path cannot be
    /// checked. Remote failures are reported as non-success outcomes.
    pub async fn download_tile(&self, client: &PlanetClient, tile: &GeoBox) -> Result<ClipOutcome, ClipError> {
        clip_tile(client, tile, &self.retry_policy, self.poll, &self.paths).await
    }
}

#[instrument(skip(client, tile, policy, poll, paths), fields(box_id = %tile.id()))]
async fn clip_tile(
    client: &PlanetClient,
    tile: &GeoBox,
    policy: &RetryPolicy,
    poll: PollSettings,
    paths: &ClipPaths,
) -> Result<ClipOutcome, ClipError> {
    let image = tile.image().ok_or_else(|| ClipError::missing_image_id(tile.id()))?;
    let path = paths.path_for(tile.id(), image);

    let exists = tokio::fs::try_exists(&path)
        .await
        .map_err(|e| ClipError::io(path.clone(), e))?;
    if exists {
        info!(path = %path.display(), "clip already downloaded; skipping");
        return Ok(ClipOutcome::skipped(path));
    }

    let request = ClipRequest {
        aoi: tile.geojson_polygon(),
        targets: vec![ClipTarget {
            item_id: image.image_id.clone(),
            item_type: image.item_type.clone(),
            asset_type: image.asset_type.clone(),
        }],
    };
    let request = &request;

    info!(image_id = %image.image_id, "requesting clip");
    let (job, prepare_status) = match policy.run(move || client.prepare_clip(request)).await {
        Ok(accepted) => accepted,
        Err(error) if error.status() == Some(BOUNDARY_STATUS_CODE) => {
            warn!(image_id = %image.image_id, error = %error, "AOI out of bounds for image; recording for follow-up");
            return Ok(ClipOutcome::boundary(path, BOUNDARY_STATUS_CODE, error.to_string()));
        }
        Err(error) => {
            warn!(status = error.status(), error = %error, "clip request failed");
            return Ok(ClipOutcome::failed(Some(path), error.status(), error.to_string()));
        }
    };

    debug!(job_id = %job.id, status = prepare_status, "clip job accepted; polling");
    Ok(poll_and_fetch(client, &job.id, prepare_status, path, policy, poll).await)
}

/// Polls the job until it succeeds, then downloads the first result.
async fn poll_and_fetch(
    client: &PlanetClient,
    job_id: &str,
    prepare_status: u16,
    path: PathBuf,
    policy: &RetryPolicy,
    poll: PollSettings,
) -> ClipOutcome {
    for attempt in 1..=poll.max_attempts {
        tokio::time::sleep(poll.interval).await;

        let status = match policy.run(move || client.clip_status(job_id)).await {
            Ok(status) => status,
            Err(error) => {
                warn!(job_id, attempt, error = %error, "clip status poll failed");
                continue;
            }
        };
        if !status.is_succeeded() {
            debug!(job_id, attempt, state = %status.state, "clip not ready");
            continue;
        }

        let Some(url) = status.first_result() else {
            warn!(job_id, "clip job succeeded without result links");
            return ClipOutcome::failed(Some(path), None, format!("clip job {job_id} succeeded without result links"));
        };

        info!(path = %path.display(), "downloading clip");
        let target = path.as_path();
        return match policy.run(move || client.download_to_file(url, target)).await {
            Ok(bytes) => {
                info!(bytes, "clip downloaded");
                ClipOutcome::succeeded(path, prepare_status)
            }
            Err(error) => {
                warn!(status = error.status(), error = %error, "clip download failed");
                ClipOutcome::failed(Some(path), error.status(), error.to_string())
            }
        };
    }

    warn!(job_id, attempts = poll.max_attempts, "clip not ready in time");
    ClipOutcome::timed_out(path, prepare_status, poll.max_attempts)
}
