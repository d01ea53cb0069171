//! Client for the imagery search and clip APIs.
//!
//! This module wraps the three remote operations the pipeline needs:
//!
//! - quick search (`POST` search URL) to find candidate images for a tile
//! - clip preparation (`POST` clips URL) and status polling (`GET` clips URL + job id)
//! - streaming download of the finished clip archive
//!
//! Every authenticated request sends the API key as the basic-auth user
//! name. Rate-limited calls are retried by [`RetryPolicy`]; everything else
//! surfaces as an [`ApiError`] for the caller to record.

mod client;
mod constants;
mod credentials;
mod error;
mod retry;
mod types;

pub use client::{Endpoints, PlanetClient};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_API_KEY_ENV, DEFAULT_CLIPS_URL, DEFAULT_SEARCH_URL, READ_TIMEOUT_SECS,
};
pub use credentials::Credentials;
pub use error::ApiError;
pub use retry::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, FailureType, RetryDecision, RetryPolicy,
    classify_error,
};
pub use types::{ClipJob, ClipJobStatus, ClipLinks, ClipRequest, ClipTarget, SearchFeature, SearchRequest, SearchResponse};
