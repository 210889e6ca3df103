//! Journal-by-journal crawl pipeline: discover, filter, download.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::CancelToken;
use crate::cache::{CacheEntry, CachePayload, CacheStore, FileCacheStore, default_cache_path};
use crate::config::{ConfigError, CrawlerConfig};
use crate::discovery::{
    ChallengeClassifier, DiscoveryError, DiscoveryTask, FetcherStrategy, SignatureClassifier,
    SiteLayout, StaticJournalStrategy, Strategy, StrategyError, StrategyExecutor,
};
use crate::download::DownloadCoordinator;
use crate::fetch::{FetchError, Fetcher, HttpFetcher, Session, UnavailableRenderer};
use crate::filter::{AcceptedArticle, filter_articles};
use crate::model::{
    ArticleRecord, CrawlRequest, CrawlResult, DownloadOutcome, JournalRef, JournalReport,
    JournalState, RequestError,
};
use crate::parser::{CellParser, ParseError, PageParser};
use crate::progress::{NoopProgress, ProgressReporter};

/// Errors that abort a whole run.
///
/// Per-journal and per-article problems never surface here; they are
/// recorded in [`JournalReport`] and [`DownloadOutcome`] instead.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The request failed validation.
    #[error("invalid crawl request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP session could not be created.
    #[error("cannot create session: {0}")]
    Session(#[source] FetchError),

    /// The default parser could not compile its selectors.
    #[error("cannot build page parser: {0}")]
    Parser(#[from] ParseError),

    /// Every discovery strategy failed and no cached copy exists.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The blocking facade could not start its runtime.
    #[error("cannot start async runtime: {source}")]
    Runtime {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Builder for [`Crawler`]. Every component has a production default.
#[derive(Debug)]
pub struct CrawlerBuilder {
    config: CrawlerConfig,
    cache: Option<Arc<dyn CacheStore>>,
    strategies: Option<Vec<Arc<dyn Strategy>>>,
    renderer: Option<Arc<dyn Fetcher>>,
    classifier: Option<Arc<dyn ChallengeClassifier>>,
    parser: Option<Arc<dyn PageParser>>,
    page_fetcher: Option<Arc<dyn Fetcher>>,
}

impl CrawlerBuilder {
    /// Replaces the on-disk cache store.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the whole strategy chain. Order is preserved.
    #[must_use]
    pub fn strategies(mut self, strategies: Vec<Arc<dyn Strategy>>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    /// Fetcher backing the browser strategy of the default chain.
    #[must_use]
    pub fn renderer(mut self, renderer: Arc<dyn Fetcher>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replaces the challenge classifier.
    #[must_use]
    pub fn classifier(mut self, classifier: Arc<dyn ChallengeClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Replaces the page parser.
    #[must_use]
    pub fn parser(mut self, parser: Arc<dyn PageParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Fetcher used for article pages when a listing entry has no PDF link.
    #[must_use]
    pub fn page_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.page_fetcher = Some(fetcher);
        self
    }

    /// Validates the configuration and assembles the crawler.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Config`] for invalid settings, [`CrawlError::Parser`]
    /// when the default parser cannot be built.
    pub fn build(self) -> Result<Crawler, CrawlError> {
        self.config.validate()?;

        let layout = SiteLayout::new(&self.config.base_url);
        let classifier: Arc<dyn ChallengeClassifier> = self.classifier.unwrap_or_else(|| {
            Arc::new(SignatureClassifier::with_extra_signatures(
                &self.config.challenge_signatures,
            ))
        });
        let parser: Arc<dyn PageParser> = match self.parser {
            Some(parser) => parser,
            None => Arc::new(CellParser::new()?),
        };
        let strategies = match self.strategies {
            Some(strategies) => strategies,
            None => {
                let renderer = self
                    .renderer
                    .unwrap_or_else(|| Arc::new(UnavailableRenderer));
                default_strategies(&layout, renderer, &classifier)
            }
        };
        let cache: Arc<dyn CacheStore> = self.cache.unwrap_or_else(|| {
            let path = self
                .config
                .cache_path
                .clone()
                .unwrap_or_else(default_cache_path);
            Arc::new(FileCacheStore::new(path))
        });
        let page_fetcher = self
            .page_fetcher
            .unwrap_or_else(|| Arc::new(HttpFetcher::new()));

        let coordinator = DownloadCoordinator::from_config(
            &self.config,
            Arc::clone(&parser),
            page_fetcher,
            classifier,
        );

        info!(
            base_url = %self.config.base_url,
            strategies = strategies.len(),
            workers = self.config.workers,
            "crawler ready"
        );

        Ok(Crawler {
            workers: Arc::new(Semaphore::new(self.config.workers)),
            executor: StrategyExecutor::new(strategies),
            cache,
            parser,
            coordinator: Arc::new(coordinator),
            config: self.config,
        })
    }
}

fn default_strategies(
    layout: &SiteLayout,
    renderer: Arc<dyn Fetcher>,
    classifier: &Arc<dyn ChallengeClassifier>,
) -> Vec<Arc<dyn Strategy>> {
    vec![
        Arc::new(FetcherStrategy::http(layout.clone(), Arc::clone(classifier))),
        Arc::new(FetcherStrategy::browser(
            renderer,
            layout.clone(),
            Arc::clone(classifier),
        )),
        Arc::new(StaticJournalStrategy::new(layout.clone())),
    ]
}

/// Crawls journals: discovery through the strategy chain and cache,
/// filtering, then bounded concurrent downloads.
///
/// A failure in one journal never stops the others.
#[derive(Debug)]
pub struct Crawler {
    config: CrawlerConfig,
    executor: StrategyExecutor,
    cache: Arc<dyn CacheStore>,
    parser: Arc<dyn PageParser>,
    coordinator: Arc<DownloadCoordinator>,
    workers: Arc<Semaphore>,
}

/// Articles of one listing page, from the network or the cache.
struct ListingPage {
    articles: Vec<ArticleRecord>,
    next_page: Option<String>,
}

impl Crawler {
    /// Starts a builder over `config`.
    #[must_use]
    pub fn builder(config: CrawlerConfig) -> CrawlerBuilder {
        CrawlerBuilder {
            config,
            cache: None,
            strategies: None,
            renderer: None,
            classifier: None,
            parser: None,
            page_fetcher: None,
        }
    }

    /// Crawler with every default component.
    ///
    /// # Errors
    ///
    /// See [`CrawlerBuilder::build`].
    pub fn new(config: CrawlerConfig) -> Result<Self, CrawlError> {
        Self::builder(config).build()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// The download coordinator, for its counters.
    #[must_use]
    pub fn coordinator(&self) -> &DownloadCoordinator {
        &self.coordinator
    }

    /// Lists the site's journals.
    ///
    /// A fresh cached list is returned without network activity unless
    /// `force_refresh` is set. When every strategy fails, a stale cached list
    /// is served instead.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Discovery`] when every strategy failed and nothing is cached.
    pub async fn discover_journals(
        &self,
        force_refresh: bool,
    ) -> Result<Vec<JournalRef>, CrawlError> {
        let session = self.new_session(true)?;
        self.journals_with(&session, force_refresh).await
    }

    /// Runs `request` to completion.
    ///
    /// # Errors
    ///
    /// [`CrawlError::InvalidRequest`] before any work starts, or
    /// [`CrawlError::Session`] when no HTTP client can be built.
    pub async fn crawl(&self, request: &CrawlRequest) -> Result<CrawlResult, CrawlError> {
        self.crawl_with(request, &CancelToken::new(), &NoopProgress)
            .await
    }

    /// Runs `request`, reporting progress and honouring `cancel` between
    /// articles. A cancelled run returns the outcomes gathered so far.
    ///
    /// # Errors
    ///
    /// See [`crawl`](Self::crawl).
    #[instrument(skip(self, request, cancel, progress), fields(journals = request.journal_slugs().len()))]
    pub async fn crawl_with(
        &self,
        request: &CrawlRequest,
        cancel: &CancelToken,
        progress: &dyn ProgressReporter,
    ) -> Result<CrawlResult, CrawlError> {
        request.validate()?;

        let session = self.new_session(request.headless())?;
        if !session.establish().await {
            warn!("session warm-up failed; continuing without site cookies");
        }

        let slugs = request.journal_slugs();
        let mut result = CrawlResult {
            journals: slugs.iter().map(JournalReport::pending).collect(),
            ..CrawlResult::default()
        };

        let runs = if self.config.journal_concurrency <= 1 {
            let mut runs = Vec::with_capacity(slugs.len());
            for slug in slugs {
                if cancel.is_cancelled() {
                    break;
                }
                runs.push(self.crawl_journal(slug, request, &session, cancel, progress).await);
            }
            runs
        } else {
            let session = &session;
            stream::iter(slugs)
                .map(move |slug| self.crawl_journal(slug, request, session, cancel, progress))
                .buffered(self.config.journal_concurrency)
                .collect::<Vec<_>>()
                .await
        };

        for (index, (report, outcomes)) in runs.into_iter().enumerate() {
            result.journals[index] = report;
            result.outcomes.extend(outcomes);
        }

        result.cancelled = cancel.is_cancelled();
        result.journals_covered = result
            .journals
            .iter()
            .filter(|j| j.state == JournalState::Done)
            .map(|j| j.slug.clone())
            .collect();

        info!(
            outcomes = result.outcomes.len(),
            covered = result.journals_covered.len(),
            cancelled = result.cancelled,
            "crawl finished"
        );
        Ok(result)
    }

    fn new_session(&self, headless: bool) -> Result<Session, CrawlError> {
        Session::new(&self.config, headless).map_err(CrawlError::Session)
    }

    async fn journals_with(
        &self,
        session: &Session,
        force_refresh: bool,
    ) -> Result<Vec<JournalRef>, CrawlError> {
        let task = DiscoveryTask::Journals;
        let key = task.cache_key();
        let cached = self.cache.get(&key).await;

        if !force_refresh
            && let Some(entry) = &cached
            && entry.is_fresh(self.config.journal_cache_ttl)
            && let CachePayload::Journals { journals } = &entry.payload
        {
            debug!(journals = journals.len(), "journal list served from cache");
            return Ok(journals.clone());
        }

        let parser = &self.parser;
        let discovered = self
            .executor
            .discover_with(&task, session, |page| {
                parser
                    .parse_journals(&page)
                    .map_err(|e| StrategyError::unparseable(&page.url, e.to_string()))
            })
            .await;

        match discovered {
            Ok(found) => {
                let entry = CacheEntry::new(
                    key,
                    CachePayload::Journals {
                        journals: found.value.clone(),
                    },
                    found.source,
                );
                self.write_through(entry).await;
                Ok(found.value)
            }
            Err(err) => match cached {
                Some(CacheEntry {
                    payload: CachePayload::Journals { journals },
                    ..
                }) => {
                    warn!(error = %err, "all strategies failed; serving stale journal list");
                    Ok(journals)
                }
                _ => Err(err.into()),
            },
        }
    }

    async fn listing_page(
        &self,
        session: &Session,
        task: &DiscoveryTask,
    ) -> Result<ListingPage, DiscoveryError> {
        let key = task.cache_key();
        let cached = self.cache.get(&key).await;

        if let Some(entry) = &cached
            && entry.is_fresh(self.config.article_cache_ttl)
            && let CachePayload::Articles {
                articles,
                next_page,
            } = &entry.payload
        {
            debug!(task = %task, articles = articles.len(), "listing page served from cache");
            return Ok(ListingPage {
                articles: articles.clone(),
                next_page: next_page.clone(),
            });
        }

        let parser = &self.parser;
        let discovered = self
            .executor
            .discover_with(task, session, |page| {
                let listing = parser
                    .parse_articles(&page)
                    .map_err(|e| StrategyError::unparseable(&page.url, e.to_string()))?;
                if listing.skipped > 0 {
                    debug!(
                        url = %page.url,
                        skipped = listing.skipped,
                        profile = listing.profile,
                        "listing entries skipped"
                    );
                }
                Ok(listing)
            })
            .await;

        match discovered {
            Ok(found) => {
                let listing = found.value;
                let entry = CacheEntry::new(
                    key,
                    CachePayload::Articles {
                        articles: listing.articles.clone(),
                        next_page: listing.next_page.clone(),
                    },
                    found.source,
                );
                self.write_through(entry).await;
                Ok(ListingPage {
                    articles: listing.articles,
                    next_page: listing.next_page,
                })
            }
            Err(err) => match cached {
                Some(CacheEntry {
                    payload:
                        CachePayload::Articles {
                            articles,
                            next_page,
                        },
                    ..
                }) => {
                    warn!(task = %task, error = %err, "all strategies failed; serving stale listing page");
                    Ok(ListingPage {
                        articles,
                        next_page,
                    })
                }
                _ => Err(err),
            },
        }
    }

    async fn write_through(&self, entry: CacheEntry) {
        let key = entry.key.clone();
        if let Err(e) = self.cache.put(entry).await {
            warn!(key = %key, error = %e, "cache write failed");
        }
    }

    #[instrument(skip(self, request, session, cancel, progress))]
    async fn crawl_journal(
        &self,
        slug: &str,
        request: &CrawlRequest,
        session: &Session,
        cancel: &CancelToken,
        progress: &dyn ProgressReporter,
    ) -> (JournalReport, Vec<DownloadOutcome>) {
        let mut report = JournalReport::pending(slug);
        let mut outcomes = Vec::new();
        if cancel.is_cancelled() {
            return (report, outcomes);
        }

        progress.journal_started(slug);
        info!("journal started");

        let limit = request.per_journal_limit();
        let mut counted = 0usize;
        let mut seen = HashSet::new();
        let mut task = DiscoveryTask::first_listing(slug);
        let mut page = 0usize;

        loop {
            report.state = JournalState::Discovering;
            let listing = match self.listing_page(session, &task).await {
                Ok(listing) => listing,
                Err(err) if page == 0 => {
                    warn!(error = %err, "journal discovery failed");
                    report.state = JournalState::Failed;
                    report.error = Some(err.kind());
                    report.message = Some(err.to_string());
                    progress.journal_finished(&report);
                    return (report, outcomes);
                }
                Err(err) => {
                    warn!(page, error = %err, "listing page failed; stopping pagination");
                    break;
                }
            };

            report.pages_fetched += 1;
            report.discovered += listing.articles.len();
            let fresh: Vec<ArticleRecord> = listing
                .articles
                .into_iter()
                .filter(|a| seen.insert(a.source_url.clone()))
                .collect();
            let found = fresh.len();

            report.state = JournalState::Filtering;
            let accepted = filter_articles(slug, fresh, request);
            report.accepted += accepted.len();
            progress.page_discovered(slug, page, found, accepted.len());
            debug!(page, found, accepted = accepted.len(), "listing page filtered");

            report.state = JournalState::Downloading;
            counted += self
                .download_batches(accepted, request, session, cancel, progress, &mut outcomes, counted)
                .await;

            if cancel.is_cancelled() {
                info!("crawl cancelled");
                report.state = JournalState::Cancelled;
                progress.journal_finished(&report);
                return (report, outcomes);
            }
            if limit > 0 && counted >= limit {
                debug!(limit, "per-journal limit reached");
                break;
            }

            match listing.next_page {
                Some(url) if page + 1 < self.config.max_pages => {
                    page += 1;
                    task = DiscoveryTask::Articles {
                        slug: slug.to_string(),
                        page,
                        url: Some(url),
                    };
                }
                Some(_) => {
                    debug!(max_pages = self.config.max_pages, "page cap reached");
                    break;
                }
                None => break,
            }
        }

        report.state = JournalState::Done;
        info!(
            pages = report.pages_fetched,
            discovered = report.discovered,
            accepted = report.accepted,
            "journal done"
        );
        progress.journal_finished(&report);
        (report, outcomes)
    }

    /// Downloads `accepted` in batches of at most `workers` articles,
    /// checking for cancellation and the limit between batches. Returns how
    /// many outcomes counted toward the limit.
    #[allow(clippy::too_many_arguments)]
    async fn download_batches(
        &self,
        accepted: Vec<AcceptedArticle>,
        request: &CrawlRequest,
        session: &Session,
        cancel: &CancelToken,
        progress: &dyn ProgressReporter,
        outcomes: &mut Vec<DownloadOutcome>,
        already_counted: usize,
    ) -> usize {
        let limit = request.per_journal_limit();
        let mut counted = 0usize;
        let mut queue = accepted.into_iter();

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let remaining = if limit == 0 {
                usize::MAX
            } else {
                limit.saturating_sub(already_counted + counted)
            };
            if remaining == 0 {
                break;
            }

            let batch: Vec<AcceptedArticle> = queue
                .by_ref()
                .take(self.config.workers.min(remaining))
                .collect();
            if batch.is_empty() {
                break;
            }

            let results = join_all(
                batch
                    .iter()
                    .map(|article| self.download_one(article, request, session)),
            )
            .await;

            for outcome in results {
                if outcome.counts_toward_limit() {
                    counted += 1;
                }
                progress.outcome(&outcome);
                outcomes.push(outcome);
            }
        }
        counted
    }

    async fn download_one(
        &self,
        article: &AcceptedArticle,
        request: &CrawlRequest,
        session: &Session,
    ) -> DownloadOutcome {
        // The semaphore is never closed.
        let _permit = self.workers.acquire().await.ok();
        self.coordinator
            .download(article, request.out_folder(), session)
            .await
    }
}
