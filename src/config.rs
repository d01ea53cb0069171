//! Application configuration loaded from an optional TOML file.
//!
//! Every field has a default, so a missing file (or a missing section) means
//! "use the defaults". Components never read the environment themselves:
//! the binary resolves the API key and output directory here and passes the
//! built values down.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::api::{
    CONNECT_TIMEOUT_SECS, Credentials, DEFAULT_API_KEY_ENV, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_CLIPS_URL,
    DEFAULT_SEARCH_URL, Endpoints, READ_TIMEOUT_SECS, RetryPolicy,
};
use crate::clip::{DEFAULT_POLL_ATTEMPTS, PollSettings};
use crate::pool::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY, is_valid_concurrency};
use crate::search::SearchFilters;

/// Environment variable that overrides `pipeline.output_dir`.
pub const OUTPUT_DIR_ENV: &str = "PL_IMAGE_DIR";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path of the config file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`AppConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its allowed range.
    #[error("invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        /// Dotted field name, e.g. `pipeline.concurrency`.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Description of the accepted values.
        expected: String,
    },

    /// The API key environment variable is unset or empty.
    #[error("API key not found: set the {var} environment variable")]
    MissingCredential {
        /// Name of the environment variable consulted.
        var: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, value: impl ToString, expected: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}

/// `[api]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Quick-search endpoint.
    pub search_url: String,
    /// Clip-job endpoint.
    pub clips_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            clips_url: DEFAULT_CLIPS_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// `[search]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Item type searched for.
    pub item_type: String,
    /// Asset type clipped.
    pub asset_type: String,
    /// Earliest acquisition time, RFC 3339.
    pub acquired_gte: DateTime<Utc>,
    /// Latest acquisition time, RFC 3339.
    pub acquired_lte: DateTime<Utc>,
    /// Maximum cloud-cover fraction.
    pub max_cloud_cover: f64,
    /// Require the usable-data flag.
    pub full_image_only: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let filters = SearchFilters::default();
        Self {
            item_type: filters.item_type,
            asset_type: filters.asset_type,
            acquired_gte: filters.acquired_gte,
            acquired_lte: filters.acquired_lte,
            max_cloud_cover: filters.max_cloud_cover,
            full_image_only: filters.full_image_only,
        }
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Worker count for both phases.
    pub concurrency: usize,
    /// Delay before the first rate-limit retry.
    pub retry_base_delay_ms: u64,
    /// Cap on any single retry delay.
    pub retry_max_delay_ms: u64,
    /// Sleep before each clip status check.
    pub poll_interval_ms: u64,
    /// Status checks per clip job before giving up.
    pub poll_attempts: u32,
    /// Directory for clips, summary and ledger.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 10_000,
            poll_interval_ms: 1_000,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Endpoints, credentials source and timeouts.
    pub api: ApiConfig,
    /// Fixed search criteria.
    pub search: SearchConfig,
    /// Concurrency, retry, polling and output settings.
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Loads `path` if given, otherwise returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Reads, parses and validates a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("api.search_url", &self.api.search_url)?;
        validate_url("api.clips_url", &self.api.clips_url)?;
        validate_timeout_secs("api.connect_timeout_secs", self.api.connect_timeout_secs)?;
        validate_timeout_secs("api.read_timeout_secs", self.api.read_timeout_secs)?;
        if self.api.api_key_env.trim().is_empty() {
            return Err(ConfigError::invalid("api.api_key_env", "\"\"", "a variable name"));
        }

        let cloud = self.search.max_cloud_cover;
        if !(0.0..=1.0).contains(&cloud) {
            return Err(ConfigError::invalid("search.max_cloud_cover", cloud, "range: 0.0..=1.0"));
        }
        if self.search.acquired_gte > self.search.acquired_lte {
            return Err(ConfigError::invalid(
                "search.acquired_gte",
                self.search.acquired_gte.to_rfc3339(),
                format!("a time not after search.acquired_lte ({})", self.search.acquired_lte.to_rfc3339()),
            ));
        }

        let pipeline = &self.pipeline;
        if !is_valid_concurrency(pipeline.concurrency) {
            return Err(ConfigError::invalid(
                "pipeline.concurrency",
                pipeline.concurrency,
                format!("range: {MIN_CONCURRENCY}..={MAX_CONCURRENCY}"),
            ));
        }
        if pipeline.retry_base_delay_ms > pipeline.retry_max_delay_ms {
            return Err(ConfigError::invalid(
                "pipeline.retry_base_delay_ms",
                pipeline.retry_base_delay_ms,
                format!("at most pipeline.retry_max_delay_ms ({})", pipeline.retry_max_delay_ms),
            ));
        }
        if pipeline.poll_attempts == 0 {
            return Err(ConfigError::invalid("pipeline.poll_attempts", 0, "at least 1"));
        }
        Ok(())
    }

    /// Looks up the API key through `lookup` (normally `std::env::var`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when the variable is unset
    /// or blank.
    pub fn credentials<F>(&self, lookup: F) -> Result<Credentials, ConfigError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let var = self.api.api_key_env.as_str();
        match lookup(var) {
            Some(key) if !key.trim().is_empty() => Ok(Credentials::new(key.trim())),
            _ => Err(ConfigError::MissingCredential { var: var.to_string() }),
        }
    }

    /// Output directory: explicit flag, then `PL_IMAGE_DIR`, then the file.
    #[must_use]
    pub fn output_dir(&self, flag: Option<&Path>, env_override: Option<PathBuf>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| env_override.filter(|p| !p.as_os_str().is_empty()))
            .unwrap_or_else(|| self.pipeline.output_dir.clone())
    }

    /// API endpoints.
    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            search_url: self.api.search_url.clone(),
            clips_url: self.api.clips_url.clone(),
        }
    }

    /// Rate-limit retry policy for both phases.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.pipeline.retry_base_delay_ms),
            Duration::from_millis(self.pipeline.retry_max_delay_ms),
            DEFAULT_BACKOFF_MULTIPLIER,
        )
    }

    /// Clip status polling schedule.
    #[must_use]
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings::new(
            Duration::from_millis(self.pipeline.poll_interval_ms),
            self.pipeline.poll_attempts,
        )
    }

    /// Search criteria for the resolver.
    #[must_use]
    pub fn search_filters(&self) -> SearchFilters {
        SearchFilters {
            item_type: self.search.item_type.clone(),
            asset_type: self.search.asset_type.clone(),
            acquired_gte: self.search.acquired_gte,
            acquired_lte: self.search.acquired_lte,
            max_cloud_cover: self.search.max_cloud_cover,
            full_image_only: self.search.full_image_only,
        }
    }
}

fn validate_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::invalid(field, value, "an http(s) URL")),
    }
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid(field, value, "range: 1..=3600"));
    }
    Ok(())
}
