//! Error types for the imagery API client.
//!
//! Every variant carries the URL or path it concerns so a failure logged
//! deep inside a worker task can still be traced to the request that
//! produced it.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`PlanetClient`](super::PlanetClient) requests.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL being requested.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} from {url}{}", format_message(.message))]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Response body excerpt, when the server sent one.
        message: Option<String>,
    },

    /// Response body was not the JSON shape we expected.
    #[error("could not decode response from {url}: {source}")]
    Decode {
        /// The URL whose response failed to decode.
        url: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// File system error while writing a download.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

/// Longest body excerpt kept in an [`ApiError::HttpStatus`].
const MAX_MESSAGE_CHARS: usize = 200;

#[allow(clippy::ref_option)]
fn format_message(message: &Option<String>) -> String {
    message.as_ref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl ApiError {
    /// Creates a network error, mapping reqwest timeouts to [`ApiError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error without a body excerpt.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            message: None,
        }
    }

    /// Creates an HTTP status error, keeping a trimmed excerpt of the body.
    pub fn http_status_with_body(url: impl Into<String>, status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        let message = (!trimmed.is_empty()).then(|| trimmed.chars().take(MAX_MESSAGE_CHARS).collect());
        Self::HttpStatus {
            url: url.into(),
            status,
            message,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// HTTP status code, when the error came from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for HTTP 429 responses.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_timeout_display() {
        let error = ApiError::timeout("https://api.example.com/search");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://api.example.com/search"));
    }

    #[test]
    fn test_api_error_http_status_display() {
        let error = ApiError::http_status("https://api.example.com/clips", 400);
        let msg = error.to_string();
        assert!(msg.contains("400"), "Expected '400' in: {msg}");
        assert!(msg.contains("https://api.example.com/clips"), "Expected URL in: {msg}");
        assert_eq!(error.status(), Some(400));
    }

    #[test]
    fn test_api_error_body_excerpt_is_trimmed_and_bounded() {
        let long_body = format!("  {}  ", "x".repeat(500));
        let error = ApiError::http_status_with_body("https://api.example.com", 500, &long_body);
        let ApiError::HttpStatus { message, .. } = &error else {
            panic!("expected HttpStatus");
        };
        assert_eq!(message.as_deref().unwrap().len(), MAX_MESSAGE_CHARS);

        let empty = ApiError::http_status_with_body("https://api.example.com", 500, "   ");
        assert!(matches!(empty, ApiError::HttpStatus { message: None, .. }));
    }

    #[test]
    fn test_api_error_body_excerpt_in_display() {
        let error = ApiError::http_status_with_body(
            "https://api.example.com/clips",
            400,
            "AOI is outside of item footprint",
        );
        assert!(error.to_string().ends_with(": AOI is outside of item footprint"));
    }

    #[test]
    fn test_api_error_rate_limited() {
        assert!(ApiError::http_status("u", 429).is_rate_limited());
        assert!(!ApiError::http_status("u", 503).is_rate_limited());
        assert!(!ApiError::timeout("u").is_rate_limited());
    }

    #[test]
    fn test_api_error_io_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = ApiError::io("/tmp/Clip a-b c.zip", io_err);
        let msg = error.to_string();
        assert!(msg.contains("IO error"), "Expected 'IO error' in: {msg}");
        assert!(msg.contains("Clip a-b c.zip"), "Expected path in: {msg}");
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_api_error_decode_display() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error = ApiError::decode("https://api.example.com/search", source);
        assert!(error.to_string().contains("could not decode"));
    }

    #[test]
    fn test_api_error_invalid_url_display() {
        let error = ApiError::invalid_url("not-a-url");
        assert!(error.to_string().contains("invalid URL"));
        assert!(error.to_string().contains("not-a-url"));
    }
}
