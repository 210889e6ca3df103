//! Core data model shared by every stage of the crawl pipeline.
//!
//! # Overview
//!
//! - [`JournalRef`] identifies a journal discovered from the site menu.
//! - [`ArticleRecord`] is one entry from a journal's article listing.
//! - [`CrawlRequest`] is the caller's validated, read-only run description.
//! - [`DownloadOutcome`] records what happened to a single accepted article.
//! - [`CrawlResult`] aggregates outcomes and per-journal reports for a run.
//!
//! # Example
//!
//! ```
//! use crawler_core::CrawlRequest;
//!
//! let request = CrawlRequest::new(["cell", "neuron", "cell"], 2022, 2022, "out");
//! assert_eq!(request.journal_slugs(), ["cell", "neuron"]);
//! assert!(request.validate().is_ok());
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest publication year a request may ask for.
pub const MIN_YEAR: i32 = 1900;

/// Highest publication year a request may ask for.
pub const MAX_YEAR: i32 = 2100;

/// Journal slugs are lowercase path segments, optionally one level nested
/// (`heliyon/cell-press`).
#[allow(clippy::expect_used)]
static SLUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9\-]*(/[a-z0-9][a-z0-9\-]*)?$").expect("slug regex is valid") // Static pattern, safe to panic
});

/// Returns true when `slug` is a well-formed journal slug.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}

/// A journal discovered from the site navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JournalRef {
    /// URL-safe identity key (e.g. `cell`, `heliyon/cell-press`).
    pub slug: String,
    /// Human-readable journal name.
    pub display_name: String,
}

impl JournalRef {
    /// Creates a journal reference.
    #[must_use]
    pub fn new(slug: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            display_name: display_name.into(),
        }
    }
}

impl fmt::Display for JournalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.slug)
    }
}

/// One article entry taken from a journal listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Article title, or `Article N` when the listing omitted it.
    pub title: String,
    /// Absolute article (full-text) URL; unique within a journal.
    pub source_url: String,
    /// Publication year parsed from the listing date.
    pub publication_year: i32,
    /// Whether the listing marked the article as open access.
    pub is_open_access: bool,
    /// Direct PDF link when the listing carried one.
    pub pdf_url: Option<String>,
}

/// Terminal status of a single article download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadStatus {
    /// The PDF was fetched, validated and persisted.
    Succeeded,
    /// A file for this article already existed; nothing was fetched.
    SkippedExists,
    /// The article could not be downloaded.
    Failed,
}

impl DownloadStatus {
    /// Stable label used in progress lines and manifests.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "SUCCEEDED",
            Self::SkippedExists => "SKIPPED_EXISTS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure classification recorded in outcomes and journal reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// An anti-bot interstitial was served instead of the requested content.
    ChallengeDetected,
    /// Network failure, timeout or 5xx after exhausting retries.
    TransientNetworkError,
    /// 404, unauthorized without a challenge signature, or malformed payload.
    PermanentFetchError,
    /// The page did not match any known markup layout.
    ParseStructuralError,
    /// Every acquisition strategy failed for a discovery task.
    DiscoveryExhausted,
    /// The cache file was unreadable; treated as a cold start.
    CacheCorrupt,
}

impl ErrorKind {
    /// Stable label used in progress lines and manifests.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChallengeDetected => "ChallengeDetected",
            Self::TransientNetworkError => "TransientNetworkError",
            Self::PermanentFetchError => "PermanentFetchError",
            Self::ParseStructuralError => "ParseStructuralError",
            Self::DiscoveryExhausted => "DiscoveryExhausted",
            Self::CacheCorrupt => "CacheCorrupt",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of handing one accepted article to the download coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// Slug of the journal the article belongs to.
    pub journal: String,
    /// The article this outcome describes.
    pub article: ArticleRecord,
    /// Terminal status.
    pub status: DownloadStatus,
    /// Where the PDF lives (present for succeeded and skipped outcomes).
    pub local_path: Option<PathBuf>,
    /// Failure classification (present for failed outcomes).
    pub error: Option<ErrorKind>,
    /// Human-readable failure detail.
    pub message: Option<String>,
    /// Bytes written to disk by this run (zero when skipped).
    pub bytes_written: u64,
    /// Wall-clock time spent on the article.
    pub elapsed_ms: u64,
    /// Number of fetch attempts made for the PDF.
    pub attempts: u32,
    /// When the outcome was recorded.
    pub finished_at: DateTime<Utc>,
}

impl DownloadOutcome {
    /// Builds a succeeded outcome.
    #[must_use]
    pub fn succeeded(
        journal: impl Into<String>,
        article: ArticleRecord,
        path: PathBuf,
        bytes_written: u64,
        attempts: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            journal: journal.into(),
            article,
            status: DownloadStatus::Succeeded,
            local_path: Some(path),
            error: None,
            message: None,
            bytes_written,
            elapsed_ms,
            attempts,
            finished_at: Utc::now(),
        }
    }

    /// Builds an outcome for an article whose file already exists.
    #[must_use]
    pub fn skipped_exists(journal: impl Into<String>, article: ArticleRecord, path: PathBuf) -> Self {
        Self {
            journal: journal.into(),
            article,
            status: DownloadStatus::SkippedExists,
            local_path: Some(path),
            error: None,
            message: None,
            bytes_written: 0,
            elapsed_ms: 0,
            attempts: 0,
            finished_at: Utc::now(),
        }
    }

    /// Builds a failed outcome.
    #[must_use]
    pub fn failed(
        journal: impl Into<String>,
        article: ArticleRecord,
        kind: ErrorKind,
        message: impl Into<String>,
        attempts: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            journal: journal.into(),
            article,
            status: DownloadStatus::Failed,
            local_path: None,
            error: Some(kind),
            message: Some(message.into()),
            bytes_written: 0,
            elapsed_ms,
            attempts,
            finished_at: Utc::now(),
        }
    }

    /// Whether this outcome counts toward the per-journal download limit.
    #[must_use]
    pub fn counts_toward_limit(&self) -> bool {
        matches!(
            self.status,
            DownloadStatus::Succeeded | DownloadStatus::SkippedExists
        )
    }

    /// One-line, human-readable progress string.
    #[must_use]
    pub fn progress_line(&self) -> String {
        match self.status {
            DownloadStatus::Succeeded => format!(
                "[{}] {} {} ({} bytes, {} ms)",
                self.journal,
                self.status,
                self.article.title,
                self.bytes_written,
                self.elapsed_ms
            ),
            DownloadStatus::SkippedExists => {
                format!("[{}] {} {}", self.journal, self.status, self.article.title)
            }
            DownloadStatus::Failed => format!(
                "[{}] {} {}: {} {}",
                self.journal,
                self.status,
                self.article.title,
                self.error.map_or("unknown", ErrorKind::as_str),
                self.message.as_deref().unwrap_or_default()
            ),
        }
    }
}

/// Errors returned when a [`CrawlRequest`] fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// No journal slug was supplied.
    #[error("at least one journal slug is required")]
    NoJournals,

    /// A slug is empty or contains characters that cannot appear in a journal path.
    #[error("invalid journal slug {slug:?}: expected lowercase letters, digits and hyphens")]
    InvalidSlug {
        /// The offending slug.
        slug: String,
    },

    /// The year range is inverted.
    #[error("invalid year range: from {from} is after to {to}")]
    InvertedYearRange {
        /// Requested lower bound.
        from: i32,
        /// Requested upper bound.
        to: i32,
    },

    /// A year lies outside the supported window.
    #[error("year {year} is outside the supported range {MIN_YEAR}..={MAX_YEAR}")]
    YearOutOfRange {
        /// The offending year.
        year: i32,
    },

    /// The output folder is empty.
    #[error("output folder must not be empty")]
    EmptyOutFolder,
}

/// Caller description of a crawl run.
///
/// Journal slugs are deduplicated at construction, keeping first-occurrence
/// order; journals are processed in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    journal_slugs: Vec<String>,
    year_from: i32,
    year_to: i32,
    out_folder: PathBuf,
    per_journal_limit: usize,
    headless: bool,
}

impl CrawlRequest {
    /// Creates a request with no per-journal limit, running headless.
    #[must_use]
    pub fn new<I, S>(slugs: I, year_from: i32, year_to: i32, out_folder: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let journal_slugs = slugs
            .into_iter()
            .map(|slug| slug.into().trim().to_string())
            .filter(|slug| seen.insert(slug.clone()))
            .collect();

        Self {
            journal_slugs,
            year_from,
            year_to,
            out_folder: out_folder.into(),
            per_journal_limit: 0,
            headless: true,
        }
    }

    /// Caps the number of downloaded articles per journal (0 = unlimited).
    #[must_use]
    pub fn with_limit(mut self, per_journal_limit: usize) -> Self {
        self.per_journal_limit = per_journal_limit;
        self
    }

    /// Sets whether browser rendering should run headless.
    #[must_use]
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Validates the request. Called once at orchestrator entry.
    ///
    /// # Errors
    ///
    /// Returns the first [`RequestError`] found.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.journal_slugs.is_empty() {
            return Err(RequestError::NoJournals);
        }
        if let Some(slug) = self.journal_slugs.iter().find(|s| !is_valid_slug(s)) {
            return Err(RequestError::InvalidSlug { slug: slug.clone() });
        }
        for year in [self.year_from, self.year_to] {
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(RequestError::YearOutOfRange { year });
            }
        }
        if self.year_from > self.year_to {
            return Err(RequestError::InvertedYearRange {
                from: self.year_from,
                to: self.year_to,
            });
        }
        if self.out_folder.as_os_str().is_empty() {
            return Err(RequestError::EmptyOutFolder);
        }
        Ok(())
    }

    /// Journal slugs in processing order.
    #[must_use]
    pub fn journal_slugs(&self) -> &[String] {
        &self.journal_slugs
    }

    /// Inclusive lower publication year.
    #[must_use]
    pub fn year_from(&self) -> i32 {
        self.year_from
    }

    /// Inclusive upper publication year.
    #[must_use]
    pub fn year_to(&self) -> i32 {
        self.year_to
    }

    /// Root folder under which per-journal folders are created.
    #[must_use]
    pub fn out_folder(&self) -> &Path {
        &self.out_folder
    }

    /// Per-journal download cap (0 = unlimited).
    #[must_use]
    pub fn per_journal_limit(&self) -> usize {
        self.per_journal_limit
    }

    /// Whether browser rendering should run headless.
    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }
}

/// Per-journal lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalState {
    /// Not yet started.
    Pending,
    /// Fetching listing pages.
    Discovering,
    /// Applying license/date predicates.
    Filtering,
    /// Handing accepted articles to the download coordinator.
    Downloading,
    /// Finished; individual outcomes may still contain failures.
    Done,
    /// Listing discovery failed; no downloads were attempted.
    Failed,
    /// Stopped by cancellation after work had started; outcomes gathered so
    /// far are kept.
    Cancelled,
}

/// Summary of one journal's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalReport {
    /// Journal slug.
    pub slug: String,
    /// Final lifecycle state.
    pub state: JournalState,
    /// Listing pages obtained (from cache or network).
    pub pages_fetched: usize,
    /// Articles parsed from listing pages.
    pub discovered: usize,
    /// Articles that passed the filter.
    pub accepted: usize,
    /// Failure classification when the journal failed.
    pub error: Option<ErrorKind>,
    /// Human-readable failure detail.
    pub message: Option<String>,
}

impl JournalReport {
    /// Creates a pending report.
    #[must_use]
    pub fn pending(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            state: JournalState::Pending,
            pages_fetched: 0,
            discovered: 0,
            accepted: 0,
            error: None,
            message: None,
        }
    }
}

/// Aggregate result of a crawl run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    /// Outcomes in journal order, then discovery order.
    pub outcomes: Vec<DownloadOutcome>,
    /// Journals that reached `DONE`.
    pub journals_covered: Vec<String>,
    /// One report per requested journal.
    pub journals: Vec<JournalReport>,
    /// Whether the run was cancelled before finishing.
    pub cancelled: bool,
}

impl CrawlResult {
    /// Number of outcomes with the given status.
    #[must_use]
    pub fn count(&self, status: DownloadStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Whether any outcome or journal failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.count(DownloadStatus::Failed) > 0
            || self.journals.iter().any(|j| j.state == JournalState::Failed)
    }
}
