//! Terminal progress reporting for crawl runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crawler_core::{DownloadOutcome, DownloadStatus, JournalReport, JournalState, ProgressReporter};
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_use_spinner(
    stderr_is_terminal: bool,
    quiet: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

/// Prints one line per outcome and keeps a spinner with running totals.
///
/// Without a spinner the lines go straight to stdout.
pub(crate) struct CliProgress {
    spinner: Option<ProgressBar>,
    quiet: bool,
    succeeded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl CliProgress {
    pub(crate) fn new(use_spinner: bool, quiet: bool) -> Self {
        let spinner = use_spinner.then(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        });
        Self {
            spinner,
            quiet,
            succeeded: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    pub(crate) fn finish(&self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }

    fn line(&self, text: &str) {
        if self.quiet {
            return;
        }
        match &self.spinner {
            Some(spinner) => spinner.println(text),
            None => println!("{text}"),
        }
    }

    fn set_message(&self, message: String) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(message);
        }
    }

    fn totals(&self) -> String {
        format!(
            "{} downloaded, {} skipped, {} failed",
            self.succeeded.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        )
    }
}

impl ProgressReporter for CliProgress {
    fn journal_started(&self, slug: &str) {
        self.set_message(format!("[{slug}] discovering articles... ({})", self.totals()));
    }

    fn page_discovered(&self, slug: &str, page: usize, articles: usize, accepted: usize) {
        self.set_message(format!(
            "[{slug}] page {}: {accepted}/{articles} open access in range ({})",
            page + 1,
            self.totals()
        ));
    }

    fn outcome(&self, outcome: &DownloadOutcome) {
        let counter = match outcome.status {
            DownloadStatus::Succeeded => &self.succeeded,
            DownloadStatus::SkippedExists => &self.skipped,
            DownloadStatus::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.line(&outcome.progress_line());
        self.set_message(format!("[{}] {}", outcome.journal, self.totals()));
    }

    fn journal_finished(&self, report: &JournalReport) {
        if report.state == JournalState::Failed {
            self.line(&format!(
                "[{}] FAILED {}: {}",
                report.slug,
                report.error.map_or("unknown", |kind| kind.as_str()),
                report.message.as_deref().unwrap_or_default()
            ));
        }
    }
}
