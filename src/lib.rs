//! Papers Crawler Core Library
//!
//! This library discovers Cell Press journals, walks their article listings,
//! keeps the open-access articles inside a publication-year window and
//! downloads their PDFs into one folder per journal.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`cache`] - Persistent discovery cache with freshness windows
//! - [`fetch`] - Page fetchers and the shared HTTP session
//! - [`discovery`] - Ordered strategy fallback chain and challenge detection
//! - [`parser`] - Journal menu, listing and article page extraction
//! - [`filter`] - Open-access and year-range acceptance
//! - [`download`] - Politeness-gated, retrying PDF downloads
//! - [`crawl`] - Per-journal orchestration, cancellation and the blocking facade
//! - [`model`] - Records, requests, outcomes and reports
//! - [`config`] - Crawler settings and their accepted ranges
//! - [`progress`] - Progress callbacks

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod crawl;
pub mod discovery;
pub mod download;
pub mod fetch;
pub mod filter;
pub mod model;
pub mod parser;
pub mod progress;
pub(crate) mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use config::{ConfigError, CrawlerConfig};
pub use crawl::{BlockingCrawler, CancelToken, CrawlError, Crawler, CrawlerBuilder};
pub use model::{
    ArticleRecord, CrawlRequest, CrawlResult, DownloadOutcome, DownloadStatus, ErrorKind,
    JournalRef, JournalReport, JournalState, RequestError,
};
pub use progress::{NoopProgress, ProgressReporter};
