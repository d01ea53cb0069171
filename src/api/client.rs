//! HTTP client for the search and clips endpoints.
//!
//! One [`PlanetClient`] is created per run and shared read-only by every
//! worker task; cloning is cheap and reuses the same connection pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_CLIPS_URL, DEFAULT_SEARCH_URL, READ_TIMEOUT_SECS};
use super::credentials::Credentials;
use super::error::ApiError;
use super::types::{ClipJob, ClipJobStatus, ClipRequest, SearchRequest, SearchResponse};
use crate::user_agent;

/// Base URLs of the two API surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Quick-search endpoint (POST).
    pub search_url: String,
    /// Clip-job endpoint (POST to create, GET `<clips_url>/<id>` to poll).
    pub clips_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            clips_url: DEFAULT_CLIPS_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Points both endpoints at `base` (`<base>/data/v1/quick-search`,
    /// `<base>/compute/ops/clips/v1`), mirroring the production layout.
    #[must_use]
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            search_url: format!("{base}/data/v1/quick-search"),
            clips_url: format!("{base}/compute/ops/clips/v1"),
        }
    }

    /// Status URL for a clip job.
    #[must_use]
    pub fn clip_status_url(&self, job_id: &str) -> String {
        format!("{}/{job_id}", self.clips_url.trim_end_matches('/'))
    }
}

/// HTTP client for search, clip preparation, status polling and downloads.
///
/// # Example
///
/// ```no_run
/// use tileclip_core::api::{Credentials, PlanetClient};
///
/// # fn example() -> Result<(), tileclip_core::api::ApiError> {
/// let client = PlanetClient::new(Credentials::new("my-api-key"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PlanetClient {
    client: Client,
    endpoints: Endpoints,
    credentials: Credentials,
}

impl PlanetClient {
    /// Creates a client with the production endpoints and default timeouts
    /// (30 s connect, 5 min read).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] if the HTTP client cannot be built.
    pub fn new(credentials: Credentials) -> Result<Self, ApiError> {
        Self::with_settings(credentials, Endpoints::default(), CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit endpoints and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] if the HTTP client cannot be built.
    pub fn with_settings(
        credentials: Credentials,
        endpoints: Endpoints,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|source| ApiError::Client { source })?;
        Ok(Self {
            client,
            endpoints,
            credentials,
        })
    }

    /// Configured endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Runs a quick search.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for transport failures, non-2xx responses, and
    /// undecodable bodies.
    #[instrument(level = "debug", skip(self, request))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ApiError> {
        let url = self.endpoints.search_url.as_str();
        let response = send(url, self.authorized(self.client.post(url)).json(request)).await?;
        decode_json(url, response).await
    }

    /// Submits a clip job, returning the job and the response status code.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpStatus`] with status 400 when the footprint is
    /// outside the image, and other [`ApiError`]s as for [`search`](Self::search).
    #[instrument(level = "debug", skip(self, request))]
    pub async fn prepare_clip(&self, request: &ClipRequest) -> Result<(ClipJob, u16), ApiError> {
        let url = self.endpoints.clips_url.as_str();
        let response = send(url, self.authorized(self.client.post(url)).json(request)).await?;
        let status = response.status().as_u16();
        let job = decode_json(url, response).await?;
        Ok((job, status))
    }

    /// Fetches the current status of a clip job.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] as for [`search`](Self::search).
    #[instrument(level = "debug", skip(self))]
    pub async fn clip_status(&self, job_id: &str) -> Result<ClipJobStatus, ApiError> {
        let url = self.endpoints.clip_status_url(job_id);
        let response = send(&url, self.authorized(self.client.get(&url))).await?;
        decode_json(&url, response).await
    }

    /// Streams `url` to `path`, returning the number of bytes written.
    ///
    /// Bytes go to `<path>.part` first and are renamed into place only after
    /// the body is complete, so `path` exists only for finished downloads.
    /// Redirects are followed; reqwest drops the credentials when a redirect
    /// leaves the original host.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] for malformed URLs, [`ApiError::Io`]
    /// for file system failures, and transport/status errors as for
    /// [`search`](Self::search).
    #[must_use = "download result contains the number of bytes written"]
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn download_to_file(&self, url: &str, path: &Path) -> Result<u64, ApiError> {
        Url::parse(url).map_err(|_| ApiError::invalid_url(url))?;
        let response = send(url, self.authorized(self.client.get(url))).await?;

        let part_path = part_path(path);
        let mut file = File::create(&part_path)
            .await
            .map_err(|e| ApiError::io(part_path.clone(), e))?;

        let stream_result = stream_to_file(&mut file, response, url, &part_path).await;
        drop(file);
        let bytes_written = match stream_result {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(path = %part_path.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(error);
            }
        };

        tokio::fs::rename(&part_path, path)
            .await
            .map_err(|e| ApiError::io(path.to_path_buf(), e))?;

        info!(bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(self.credentials.api_key(), Some(""))
    }
}

/// Sends a request and turns non-2xx responses into [`ApiError::HttpStatus`].
async fn send(url: &str, request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request.send().await.map_err(|e| ApiError::network(url, e))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::http_status_with_body(url, status.as_u16(), &body))
}

async fn decode_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(|e| ApiError::network(url, e))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::decode(url, e))
}

/// `<path>.part`, keeping the original extension.
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(file: &mut File, response: Response, url: &str, file_path: &Path) -> Result<u64, ApiError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| ApiError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| ApiError::io(file_path.to_path_buf(), e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| ApiError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}
