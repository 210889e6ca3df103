//! Plain HTTP page fetcher and client construction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, instrument};
use url::Url;

use super::{FetchError, Fetcher, RawPage, Session};
use crate::user_agent;

/// Builds the HTTP client a session uses for pages and PDFs.
///
/// Configuration: connect and whole-request timeouts, gzip decompression,
/// the shared crawler User-Agent, browser-like `Accept` headers and the
/// session cookie jar. Proxies from `HTTPS_PROXY`/`HTTP_PROXY` are honoured
/// by reqwest itself.
///
/// # Errors
///
/// Returns the reqwest builder error if the TLS backend cannot initialise.
pub fn build_client(
    cookie_jar: Arc<Jar>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,application/pdf;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(read_timeout)
        .gzip(true)
        .user_agent(user_agent::default_crawler_user_agent())
        .default_headers(headers)
        .cookie_provider(cookie_jar)
        .build()
}

/// Fetcher issuing a single GET through the session client.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl HttpFetcher {
    /// Creates the fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self, session), fields(session = session.id()))]
    async fn fetch(&self, url: &str, session: &Session) -> Result<RawPage, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let response = session
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        debug!(status, bytes = body.len(), "page fetched");
        Ok(RawPage {
            url: final_url,
            status,
            body,
            content_type,
        })
    }
}
