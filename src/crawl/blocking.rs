//! Synchronous facade over [`Crawler`] for callers without an async runtime.

use tokio::runtime::{Builder, Runtime};

use super::{CancelToken, CrawlError, Crawler};
use crate::config::CrawlerConfig;
use crate::model::{CrawlRequest, CrawlResult, JournalRef};
use crate::progress::ProgressReporter;

/// Owns a multi-threaded runtime and blocks on each call.
///
/// Must not be used from inside another tokio runtime.
#[derive(Debug)]
pub struct BlockingCrawler {
    runtime: Runtime,
    inner: Crawler,
}

impl BlockingCrawler {
    /// Builds a crawler with default components.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Runtime`] when the runtime cannot start, otherwise see
    /// [`Crawler::new`].
    pub fn new(config: CrawlerConfig) -> Result<Self, CrawlError> {
        Self::from_crawler(Crawler::new(config)?)
    }

    /// Wraps an already-built crawler.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Runtime`] when the runtime cannot start.
    pub fn from_crawler(inner: Crawler) -> Result<Self, CrawlError> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name("papers-crawler")
            .build()
            .map_err(|source| CrawlError::Runtime { source })?;
        Ok(Self { runtime, inner })
    }

    /// The wrapped async crawler.
    #[must_use]
    pub fn inner(&self) -> &Crawler {
        &self.inner
    }

    /// See [`Crawler::discover_journals`].
    ///
    /// # Errors
    ///
    /// See [`Crawler::discover_journals`].
    pub fn discover_journals(&self, force_refresh: bool) -> Result<Vec<JournalRef>, CrawlError> {
        self.runtime
            .block_on(self.inner.discover_journals(force_refresh))
    }

    /// See [`Crawler::crawl`].
    ///
    /// # Errors
    ///
    /// See [`Crawler::crawl`].
    pub fn crawl(&self, request: &CrawlRequest) -> Result<CrawlResult, CrawlError> {
        self.runtime.block_on(self.inner.crawl(request))
    }

    /// See [`Crawler::crawl_with`].
    ///
    /// # Errors
    ///
    /// See [`Crawler::crawl_with`].
    pub fn crawl_with(
        &self,
        request: &CrawlRequest,
        cancel: &CancelToken,
        progress: &dyn ProgressReporter,
    ) -> Result<CrawlResult, CrawlError> {
        self.runtime
            .block_on(self.inner.crawl_with(request, cancel, progress))
    }
}
