//! PDF download layer: payload validation, politeness, retry and naming.
//!
//! # Features
//!
//! - Streaming downloads into `.part` files, renamed once validated
//! - `%PDF` magic and minimum-size checks; challenge pages detected in the body
//! - Per-session politeness gate enforcing a minimum interval between requests
//! - Exponential backoff with jitter for transient failures, honouring Retry-After
//! - Deterministic, collision-safe filenames so reruns skip finished work
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use crawler_core::CrawlerConfig;
//! use crawler_core::discovery::SignatureClassifier;
//! use crawler_core::download::DownloadCoordinator;
//! use crawler_core::fetch::HttpFetcher;
//! use crawler_core::parser::CellParser;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CrawlerConfig::default();
//! let coordinator = DownloadCoordinator::from_config(
//!     &config,
//!     Arc::new(CellParser::new()?),
//!     Arc::new(HttpFetcher::new()),
//!     Arc::new(SignatureClassifier::default()),
//! );
//! println!("politeness: {:?}", coordinator.gate().interval());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod coordinator;
mod error;
pub mod filename;
mod politeness;
mod retry;

pub use client::PdfClient;
pub use coordinator::{DownloadCoordinator, DownloadStats};
pub use error::DownloadError;
pub use politeness::{PolitenessGate, PolitenessPermit, parse_retry_after};
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};

// We do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
