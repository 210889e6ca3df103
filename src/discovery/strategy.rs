//! Acquisition strategies tried by the executor.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use super::{ChallengeClassifier, DiscoveryTask, ResponseClass, SiteLayout};
use crate::cache::CacheSource;
use crate::fetch::{FetchError, Fetcher, HttpFetcher, RawPage, Session};
use crate::model::{ErrorKind, JournalRef};

/// Journals offered when neither HTTP nor rendering can read the site menu.
pub const DEFAULT_STATIC_JOURNALS: &[(&str, &str)] = &[
    ("cell", "Cell"),
    ("cancer-cell", "Cancer Cell"),
    ("cell-chemical-biology", "Cell Chemical Biology"),
    ("cell-genomics", "Cell Genomics"),
    ("cell-host-microbe", "Cell Host & Microbe"),
    ("cell-metabolism", "Cell Metabolism"),
    ("cell-reports", "Cell Reports"),
    ("cell-reports-medicine", "Cell Reports Medicine"),
    ("cell-stem-cell", "Cell Stem Cell"),
    ("cell-systems", "Cell Systems"),
    ("chem", "Chem"),
    ("current-biology", "Current Biology"),
    ("developmental-cell", "Developmental Cell"),
    ("immunity", "Immunity"),
    ("iscience", "iScience"),
    ("joule", "Joule"),
    ("matter", "Matter"),
    ("molecular-cell", "Molecular Cell"),
    ("neuron", "Neuron"),
    ("one-earth", "One Earth"),
    ("patterns", "Patterns"),
    ("structure", "Structure"),
];

/// Why a single strategy attempt failed.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The response was an anti-bot challenge.
    #[error("challenge detected at {url} (HTTP {status})")]
    Challenge {
        /// URL that served the challenge.
        url: String,
        /// Response status.
        status: u16,
    },

    /// The response status signals a failure.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Response status.
        status: u16,
        /// Whether the status is worth retrying later.
        transient: bool,
    },

    /// The page was fetched but its structure was not recognised.
    #[error("unrecognized page structure at {url}: {message}")]
    Unparseable {
        /// Page URL.
        url: String,
        /// Parser detail.
        message: String,
    },

    /// The underlying fetcher failed.
    #[error(transparent)]
    Fetch(FetchError),
}

impl StrategyError {
    /// Wraps a fetch failure.
    #[must_use]
    pub fn fetch(source: FetchError) -> Self {
        Self::Fetch(source)
    }

    /// Creates a challenge failure.
    pub fn challenge(url: impl Into<String>, status: u16) -> Self {
        Self::Challenge {
            url: url.into(),
            status,
        }
    }

    /// Creates a structural parse failure.
    pub fn unparseable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unparseable {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Failure classification recorded in the executor's attempt log.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Challenge { .. } => ErrorKind::ChallengeDetected,
            Self::HttpStatus {
                transient: true, ..
            }
            | Self::Fetch(FetchError::Network { .. } | FetchError::Timeout { .. }) => {
                ErrorKind::TransientNetworkError
            }
            Self::Unparseable { .. } => ErrorKind::ParseStructuralError,
            Self::HttpStatus { .. } | Self::Fetch(_) => ErrorKind::PermanentFetchError,
        }
    }
}

/// One way of obtaining a discovery page.
#[async_trait]
pub trait Strategy: Send + Sync + Debug {
    /// Name recorded in attempt logs.
    fn name(&self) -> &str;

    /// Cache provenance of pages this strategy produces.
    fn source(&self) -> CacheSource;

    /// Whether the strategy can serve `task`. Unsupported strategies are skipped silently.
    fn supports(&self, _task: &DiscoveryTask) -> bool {
        true
    }

    /// Tries once to obtain the page for `task`.
    async fn attempt(&self, task: &DiscoveryTask, session: &Session)
    -> Result<RawPage, StrategyError>;
}

/// Strategy delegating to a [`Fetcher`] and classifying the response.
#[derive(Debug)]
pub struct FetcherStrategy {
    name: String,
    source: CacheSource,
    fetcher: Arc<dyn Fetcher>,
    layout: SiteLayout,
    classifier: Arc<dyn ChallengeClassifier>,
}

impl FetcherStrategy {
    /// Creates a strategy around an arbitrary fetcher.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source: CacheSource,
        fetcher: Arc<dyn Fetcher>,
        layout: SiteLayout,
        classifier: Arc<dyn ChallengeClassifier>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            fetcher,
            layout,
            classifier,
        }
    }

    /// Plain HTTP strategy.
    #[must_use]
    pub fn http(layout: SiteLayout, classifier: Arc<dyn ChallengeClassifier>) -> Self {
        Self::new(
            "http",
            CacheSource::Primary,
            Arc::new(HttpFetcher::new()),
            layout,
            classifier,
        )
    }

    /// Browser-rendering strategy around `renderer`.
    #[must_use]
    pub fn browser(
        renderer: Arc<dyn Fetcher>,
        layout: SiteLayout,
        classifier: Arc<dyn ChallengeClassifier>,
    ) -> Self {
        Self::new(
            "browser",
            CacheSource::Fallback,
            renderer,
            layout,
            classifier,
        )
    }
}

#[async_trait]
impl Strategy for FetcherStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> CacheSource {
        self.source
    }

    #[instrument(skip(self, session), fields(strategy = %self.name, task = %task))]
    async fn attempt(
        &self,
        task: &DiscoveryTask,
        session: &Session,
    ) -> Result<RawPage, StrategyError> {
        let url = task.url(&self.layout);
        let page = self
            .fetcher
            .fetch(&url, session)
            .await
            .map_err(StrategyError::fetch)?;

        match self.classifier.classify(page.status, &page.body) {
            ResponseClass::Ok => {
                debug!(status = page.status, "strategy produced page");
                Ok(page)
            }
            ResponseClass::Challenge => Err(StrategyError::challenge(page.url, page.status)),
            ResponseClass::Transient => Err(StrategyError::HttpStatus {
                url: page.url,
                status: page.status,
                transient: true,
            }),
            ResponseClass::Permanent => Err(StrategyError::HttpStatus {
                url: page.url,
                status: page.status,
                transient: false,
            }),
        }
    }
}

/// Journal discovery from a built-in list.
///
/// Synthesises a navigation menu in the current site markup so the same
/// parser handles it as a live page.
#[derive(Debug, Clone)]
pub struct StaticJournalStrategy {
    journals: Vec<JournalRef>,
    layout: SiteLayout,
}

impl StaticJournalStrategy {
    /// Uses [`DEFAULT_STATIC_JOURNALS`].
    #[must_use]
    pub fn new(layout: SiteLayout) -> Self {
        let journals = DEFAULT_STATIC_JOURNALS
            .iter()
            .map(|(slug, name)| JournalRef::new(*slug, *name))
            .collect();
        Self::with_journals(journals, layout)
    }

    /// Uses a caller-supplied list.
    #[must_use]
    pub fn with_journals(journals: Vec<JournalRef>, layout: SiteLayout) -> Self {
        Self { journals, layout }
    }

    fn render_menu(&self) -> String {
        let mut html = String::from(
            "<html><head><title>Cell Press journals</title></head><body>\
             <div id=\"main-menu-panel-1\"><ul>",
        );
        for journal in &self.journals {
            html.push_str(&format!(
                "<li><a class=\"sub-menu__item-link\" href=\"/{}/home\">{}</a></li>",
                escape_html(&journal.slug),
                escape_html(&journal.display_name)
            ));
        }
        html.push_str("</ul></div></body></html>");
        html
    }
}

#[async_trait]
impl Strategy for StaticJournalStrategy {
    fn name(&self) -> &str {
        "static"
    }

    fn source(&self) -> CacheSource {
        CacheSource::Static
    }

    fn supports(&self, task: &DiscoveryTask) -> bool {
        task.is_journals()
    }

    async fn attempt(
        &self,
        task: &DiscoveryTask,
        _session: &Session,
    ) -> Result<RawPage, StrategyError> {
        debug!(task = %task, journals = self.journals.len(), "serving static journal list");
        Ok(RawPage::ok(self.layout.home_url(), self.render_menu()))
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
