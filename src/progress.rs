//! Progress callbacks emitted while a crawl runs.
//!
//! Every method has a no-op default, so reporters implement only what they
//! display. Callbacks may arrive from several tasks at once when journals run
//! concurrently; ordering is guaranteed only within one journal.

use crate::model::{DownloadOutcome, JournalReport};

/// Observer of crawl progress.
pub trait ProgressReporter: Send + Sync {
    /// Work on `slug` has started.
    fn journal_started(&self, _slug: &str) {}

    /// A listing page of `slug` was discovered and filtered.
    fn page_discovered(&self, _slug: &str, _page: usize, _articles: usize, _accepted: usize) {}

    /// One article reached a terminal status.
    fn outcome(&self, _outcome: &DownloadOutcome) {}

    /// `report.slug` reached its final state for this run.
    fn journal_finished(&self, _report: &JournalReport) {}
}

/// Reporter that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {}
