//! Page acquisition seam and the shared crawl session.
//!
//! # Overview
//!
//! A [`Fetcher`] turns a URL into a [`RawPage`] using a [`Session`]'s cookies
//! and client. Two implementations ship with the crate:
//!
//! - [`HttpFetcher`] issues a plain `reqwest` GET.
//! - [`UnavailableRenderer`] stands in for a browser engine when none is
//!   linked; every call fails so the strategy executor moves on.
//!
//! A browser integration plugs in by implementing [`Fetcher`] and passing it
//! to [`CrawlerBuilder::renderer`](crate::CrawlerBuilder::renderer).
//!
//! Fetchers do not judge the response: a 403 or a challenge interstitial is
//! returned as a page with its status, and classification happens in
//! [`crate::discovery`].

mod http;
mod renderer;
mod session;

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

pub use http::{HttpFetcher, build_client};
pub use renderer::UnavailableRenderer;
pub use session::Session;

/// Response obtained by a fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status code (200 for rendered pages).
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
    /// `Content-Type` header, when present.
    pub content_type: Option<String>,
}

impl RawPage {
    /// Creates a page with status 200 and no content type.
    #[must_use]
    pub fn ok(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            body: body.into(),
            content_type: Some("text/html".to_string()),
        }
    }
}

/// Errors raised while acquiring a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (DNS, connection refused, TLS, body read).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the configured timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// The URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// The fetcher cannot serve requests in this process.
    #[error("{fetcher} unavailable: {reason}")]
    Unavailable {
        /// Fetcher name.
        fetcher: &'static str,
        /// Why it is unavailable.
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Maps a reqwest error to a timeout or network error.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an unavailable error.
    pub fn unavailable(fetcher: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            fetcher,
            reason: reason.into(),
        }
    }
}

/// Opaque page acquisition capability.
#[async_trait]
pub trait Fetcher: Send + Sync + Debug {
    /// Short name used in logs and strategy failure records.
    fn name(&self) -> &'static str;

    /// Fetches `url` through `session`.
    async fn fetch(&self, url: &str, session: &Session) -> Result<RawPage, FetchError>;
}
