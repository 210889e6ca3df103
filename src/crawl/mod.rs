//! Crawl orchestration.
//!
//! # Overview
//!
//! [`Crawler`] drives each requested journal through
//! `PENDING -> DISCOVERING -> FILTERING -> DOWNLOADING -> DONE` (or `FAILED`
//! when its first listing page cannot be obtained). Listing pages come from
//! the cache when fresh, otherwise from the strategy chain, with a stale
//! cached copy as last resort. Accepted articles are downloaded in batches
//! bounded by the worker pool, and the per-journal limit counts both new
//! downloads and files already on disk.
//!
//! [`BlockingCrawler`] offers the same operations to synchronous callers.
//!
//! # Example
//!
//! ```no_run
//! use crawler_core::{CrawlRequest, Crawler, CrawlerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let crawler = Crawler::new(CrawlerConfig::default())?;
//! let request = CrawlRequest::new(["cell-reports"], 2022, 2023, "papers").with_limit(5);
//! let result = crawler.crawl(&request).await?;
//! for outcome in &result.outcomes {
//!     println!("{}", outcome.progress_line());
//! }
//! # Ok(())
//! # }
//! ```

mod blocking;
mod cancel;
mod orchestrator;

pub use blocking::BlockingCrawler;
pub use cancel::CancelToken;
pub use orchestrator::{CrawlError, Crawler, CrawlerBuilder};
