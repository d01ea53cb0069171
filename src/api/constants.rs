//! Constants for the API client (endpoints, timeouts).

/// Default search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://api.planet.com/data/v1/quick-search";

/// Default clip-job endpoint; job status lives at `<clips_url>/<job id>`.
pub const DEFAULT_CLIPS_URL: &str = "https://api.planet.com/compute/ops/clips/v1";

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large clip archives).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Environment variable holding the API key by default.
pub const DEFAULT_API_KEY_ENV: &str = "PL_API_KEY";
