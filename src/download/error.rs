//! Error types for the download module.

use std::path::PathBuf;

use thiserror::Error;

use crate::fetch::FetchError;
use crate::model::ErrorKind;

/// Errors that can occur while fetching one article PDF.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
    },

    /// The server answered with an anti-bot challenge instead of the file.
    #[error("challenge detected downloading {url} (HTTP {status})")]
    Challenge {
        /// The URL that served the challenge.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The body is not a usable PDF.
    #[error("not a PDF at {url} ({content_type}): {reason}")]
    NotPdf {
        /// The requested URL.
        url: String,
        /// Content-Type reported by the server.
        content_type: String,
        /// What failed validation.
        reason: String,
    },

    /// File system error during download (create file, write, etc.)
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

    /// The article page carried no PDF link.
    #[error("no PDF link found on {url}")]
    MissingPdfLink {
        /// Article page URL.
        url: String,
    },

    /// The article page could not be fetched by the configured page fetcher.
    #[error("cannot fetch article page {url}: {reason}")]
    PageUnavailable {
        /// Article page URL.
        url: String,
        /// Fetcher detail.
        reason: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, folding timeouts into [`Self::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a challenge error.
    pub fn challenge(url: impl Into<String>, status: u16) -> Self {
        Self::Challenge {
            url: url.into(),
            status,
        }
    }

    /// Creates a payload validation error.
    pub fn not_pdf(
        url: impl Into<String>,
        content_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::NotPdf {
            url: url.into(),
            content_type: content_type.into(),
            reason: reason.into(),
        }
    }

    /// Converts an article-page fetch failure.
    #[must_use]
    pub fn from_fetch(url: &str, error: FetchError) -> Self {
        match error {
            FetchError::Network { url, source } => Self::network(url, source),
            FetchError::Timeout { url } => Self::Timeout { url },
            FetchError::InvalidUrl { url } => Self::InvalidUrl { url },
            other @ (FetchError::Unavailable { .. } | FetchError::ClientBuild { .. }) => {
                Self::PageUnavailable {
                    url: url.to_string(),
                    reason: other.to_string(),
                }
            }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
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

    /// Classification reported on the outcome.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Challenge { .. } => ErrorKind::ChallengeDetected,
            Self::Network { .. } | Self::Timeout { .. } => ErrorKind::TransientNetworkError,
            Self::HttpStatus { status, .. }
                if *status == 408 || *status == 429 || (500..600).contains(status) =>
            {
                ErrorKind::TransientNetworkError
            }
            Self::HttpStatus { .. }
            | Self::NotPdf { .. }
            | Self::Io { .. }
            | Self::InvalidUrl { .. }
            | Self::MissingPdfLink { .. }
            | Self::PageUnavailable { .. } => ErrorKind::PermanentFetchError,
        }
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs the
// url or path for context, so callers go through the constructors above.
