//! Concurrent image-id resolution for tiles.
//!
//! Each tile is searched independently by its own tokio task; a semaphore
//! bounds how many searches are in flight. Results come back in input
//! order regardless of completion order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::{ResolveError, SearchFilters};
use crate::api::{PlanetClient, RetryPolicy};
use crate::geo::GeoBox;
use crate::pool::is_valid_concurrency;

/// Outcome of resolving one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The first search candidate was attached to the tile.
    Resolved {
        /// Selected image identifier.
        image_id: String,
    },
    /// The search succeeded but returned no candidates.
    NoCandidate,
    /// The search failed with a non-retryable error, or the task panicked.
    Failed {
        /// HTTP status, when the failure was a response.
        status: Option<u16>,
        /// Error description.
        error: String,
    },
}

/// A tile together with its resolution outcome.
///
/// For [`ResolveOutcome::Resolved`] the tile carries its image reference;
/// otherwise it is returned unchanged.
#[derive(Debug, Clone)]
pub struct TileResolution {
    /// The tile, with its image attached when resolved.
    pub tile: GeoBox,
    /// What happened.
    pub outcome: ResolveOutcome,
}

impl TileResolution {
    /// True when an image was attached.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome, ResolveOutcome::Resolved { .. })
    }
}

/// Resolves tiles to image ids with a bounded worker pool.
///
/// # Concurrency Model
///
/// - Each tile runs in its own Tokio task
/// - A semaphore permit is acquired before spawning each task
/// - Permits are released automatically when tasks complete (RAII)
/// - A panicking task becomes that tile's [`ResolveOutcome::Failed`]
#[derive(Debug)]
pub struct IdResolver {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_policy: RetryPolicy,
    filters: Arc<SearchFilters>,
}

impl IdResolver {
    /// Creates a resolver.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug", skip(retry_policy, filters))]
    pub fn new(concurrency: usize, retry_policy: RetryPolicy, filters: SearchFilters) -> Result<Self, ResolveError> {
        if !is_valid_concurrency(concurrency) {
            return Err(ResolveError::InvalidConcurrency { value: concurrency });
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
            filters: Arc::new(filters),
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the search filters applied to every tile.
    #[must_use]
    pub fn filters(&self) -> &SearchFilters {
        &self.filters
    }

    /// Resolves every tile, returning one [`TileResolution`] per input tile
    /// in input order.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::SemaphoreClosed`] if the semaphore is closed.
    /// Individual tile failures do NOT cause this method to error.
    #[instrument(skip(self, client, tiles), fields(tiles = tiles.len(), concurrency = self.concurrency))]
    pub async fn resolve(&self, client: &PlanetClient, tiles: Vec<GeoBox>) -> Result<Vec<TileResolution>, ResolveError> {
        info!("starting image id resolution");
        let mut handles = Vec::with_capacity(tiles.len());

        for tile in tiles {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ResolveError::SemaphoreClosed)?;

            let client = client.clone();
            let filters = Arc::clone(&self.filters);
            let retry_policy = self.retry_policy.clone();
            let fallback = tile.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                resolve_tile(&client, tile, &filters, &retry_policy).await
            });
            handles.push((fallback, handle));
        }

        debug!(task_count = handles.len(), "waiting for searches to complete");

        let mut resolutions = Vec::with_capacity(handles.len());
        for (fallback, handle) in handles {
            let resolution = match handle.await {
                Ok(resolution) => resolution,
                Err(e) => {
                    warn!(box_id = %fallback.id(), error = %e, "search task panicked");
                    TileResolution {
                        tile: fallback,
                        outcome: ResolveOutcome::Failed {
                            status: None,
                            error: format!("search task failed: {e}"),
                        },
                    }
                }
            };
            resolutions.push(resolution);
        }

        let resolved = resolutions.iter().filter(|r| r.is_resolved()).count();
        let no_candidate = resolutions
            .iter()
            .filter(|r| r.outcome == ResolveOutcome::NoCandidate)
            .count();
        info!(
            resolved,
            no_candidate,
            failed = resolutions.len() - resolved - no_candidate,
            "image id resolution complete"
        );
        Ok(resolutions)
    }
}

#[instrument(skip(client, tile, filters, policy), fields(box_id = %tile.id()))]
async fn resolve_tile(
    client: &PlanetClient,
    tile: GeoBox,
    filters: &SearchFilters,
    policy: &RetryPolicy,
) -> TileResolution {
    let request = filters.search_request(&tile);
    let request = &request;

    match policy.run(move || client.search(request)).await {
        Ok(response) => match response.first_id() {
            Some(image_id) => {
                debug!(image_id, candidates = response.features.len(), "selected first candidate");
                let outcome = ResolveOutcome::Resolved {
                    image_id: image_id.to_string(),
                };
                TileResolution {
                    tile: tile.with_image(filters.image_ref(image_id)),
                    outcome,
                }
            }
            None => {
                warn!("no candidate image found");
                TileResolution {
                    tile,
                    outcome: ResolveOutcome::NoCandidate,
                }
            }
        },
        Err(error) => {
            warn!(status = error.status(), error = %error, "search failed");
            TileResolution {
                tile,
                outcome: ResolveOutcome::Failed {
                    status: error.status(),
                    error: error.to_string(),
                },
            }
        }
    }
}
