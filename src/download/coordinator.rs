//! Per-article download orchestration.
//!
//! # Overview
//!
//! [`DownloadCoordinator::download`] turns one [`AcceptedArticle`] into a
//! [`DownloadOutcome`]; it never returns an error. The steps are:
//!
//! 1. compute the deterministic destination; an existing file is
//!    `SKIPPED_EXISTS` and nothing is fetched
//! 2. make sure the shared session has been established
//! 3. resolve the PDF URL from the article page if the listing had none
//! 4. fetch the PDF, retrying transient failures with backoff
//!
//! Every request in steps 3 and 4 passes the session's [`PolitenessGate`],
//! so the configured interval separates downloads whatever their outcome.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use super::client::PdfClient;
use super::filename::article_path;
use super::politeness::{PolitenessGate, parse_retry_after};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::DownloadError;
use crate::config::CrawlerConfig;
use crate::discovery::{ChallengeClassifier, ResponseClass};
use crate::fetch::{Fetcher, Session};
use crate::filter::AcceptedArticle;
use crate::model::DownloadOutcome;
use crate::parser::PageParser;

/// Counters for one coordinator's lifetime.
///
/// Atomic so concurrent download tasks can update them through `&self`.
#[derive(Debug, Default)]
pub struct DownloadStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    retried: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of PDFs written.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of failed articles.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of articles whose file already existed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Returns the number of retry attempts made.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Returns the number of articles handled (completed + failed + skipped).
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed() + self.skipped()
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }
}

/// Downloads accepted articles under the politeness and retry policies.
#[derive(Debug)]
pub struct DownloadCoordinator {
    policy: RetryPolicy,
    gate: Arc<PolitenessGate>,
    pdf: PdfClient,
    parser: Arc<dyn PageParser>,
    page_fetcher: Arc<dyn Fetcher>,
    classifier: Arc<dyn ChallengeClassifier>,
    stats: DownloadStats,
}

impl DownloadCoordinator {
    /// Creates a coordinator from explicit parts.
    #[must_use]
    pub fn new(
        policy: RetryPolicy,
        gate: Arc<PolitenessGate>,
        pdf: PdfClient,
        parser: Arc<dyn PageParser>,
        page_fetcher: Arc<dyn Fetcher>,
        classifier: Arc<dyn ChallengeClassifier>,
    ) -> Self {
        Self {
            policy,
            gate,
            pdf,
            parser,
            page_fetcher,
            classifier,
            stats: DownloadStats::new(),
        }
    }

    /// Creates a coordinator using the retry, politeness and payload settings of `config`.
    #[must_use]
    pub fn from_config(
        config: &CrawlerConfig,
        parser: Arc<dyn PageParser>,
        page_fetcher: Arc<dyn Fetcher>,
        classifier: Arc<dyn ChallengeClassifier>,
    ) -> Self {
        let gate = if config.politeness.is_zero() {
            PolitenessGate::disabled()
        } else {
            PolitenessGate::new(config.politeness)
        };
        Self::new(
            RetryPolicy::from_config(config),
            Arc::new(gate),
            PdfClient::new(Arc::clone(&classifier), config.min_pdf_bytes),
            parser,
            page_fetcher,
            classifier,
        )
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> &DownloadStats {
        &self.stats
    }

    /// The politeness gate shared by every download of this coordinator.
    #[must_use]
    pub fn gate(&self) -> &Arc<PolitenessGate> {
        &self.gate
    }

    /// Downloads one accepted article into `out_folder`.
    ///
    /// Never fails: every problem is reported in the returned outcome.
    #[instrument(
        skip(self, accepted, out_folder, session),
        fields(journal = accepted.journal(), source = %accepted.article().source_url)
    )]
    pub async fn download(
        &self,
        accepted: &AcceptedArticle,
        out_folder: &Path,
        session: &Session,
    ) -> DownloadOutcome {
        let started = Instant::now();
        let journal = accepted.journal();
        let article = accepted.article();
        let dest = article_path(out_folder, journal, article);

        if tokio::fs::metadata(&dest)
            .await
            .is_ok_and(|meta| meta.is_file())
        {
            info!(path = %dest.display(), "already downloaded, skipping");
            self.stats.increment_skipped();
            return DownloadOutcome::skipped_exists(journal, article.clone(), dest);
        }

        if let Some(parent) = dest.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            let error = DownloadError::io(parent, e);
            warn!(error = %error, "cannot create journal folder");
            self.stats.increment_failed();
            return DownloadOutcome::failed(
                journal,
                article.clone(),
                error.kind(),
                error.to_string(),
                0,
                elapsed_ms(started),
            );
        }

        session.establish().await;

        match self.download_with_retry(accepted, &dest, session).await {
            Ok((bytes, attempts)) => {
                self.stats.increment_completed();
                DownloadOutcome::succeeded(
                    journal,
                    article.clone(),
                    dest,
                    bytes,
                    attempts,
                    elapsed_ms(started),
                )
            }
            Err((error, attempts)) => {
                let kind = error.kind();
                warn!(%kind, attempts, error = %error, "article download failed");
                self.stats.increment_failed();
                DownloadOutcome::failed(
                    journal,
                    article.clone(),
                    kind,
                    error.to_string(),
                    attempts,
                    elapsed_ms(started),
                )
            }
        }
    }

    /// Retries transient failures; returns bytes written and attempts made.
    async fn download_with_retry(
        &self,
        accepted: &AcceptedArticle,
        dest: &Path,
        session: &Session,
    ) -> Result<(u64, u32), (DownloadError, u32)> {
        let article = accepted.article();
        let mut pdf_url = article.pdf_url.clone();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting download");

            match self
                .attempt_once(&mut pdf_url, &article.source_url, dest, session)
                .await
            {
                Ok(bytes) => return Ok((bytes, attempt)),
                Err(e) => {
                    let failure_type = classify_error(&e);

                    let retry_after_delay = if failure_type == FailureType::RateLimited {
                        self.extract_retry_after_delay(&e, session).await
                    } else {
                        None
                    };

                    match self.policy.should_retry(failure_type, attempt) {
                        RetryDecision::Retry {
                            delay: backoff_delay,
                            attempt: next_attempt,
                        } => {
                            let delay = retry_after_delay.unwrap_or(backoff_delay);
                            info!(
                                attempt = next_attempt,
                                max_attempts = self.policy.max_attempts(),
                                delay_ms = delay.as_millis(),
                                using_retry_after = retry_after_delay.is_some(),
                                error = %e,
                                "retrying download"
                            );
                            self.stats.increment_retried();
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            debug!(%reason, "not retrying download");
                            return Err((e, attempt));
                        }
                    }
                }
            }
        }
    }

    /// One gated attempt: resolve the PDF URL if still unknown, then fetch it.
    async fn attempt_once(
        &self,
        pdf_url: &mut Option<String>,
        source_url: &str,
        dest: &Path,
        session: &Session,
    ) -> Result<u64, DownloadError> {
        let url = match pdf_url {
            Some(url) => url.clone(),
            None => {
                let resolved = self.resolve_pdf_url(source_url, session).await?;
                *pdf_url = Some(resolved.clone());
                resolved
            }
        };

        let permit = self.gate.acquire(session.id()).await;
        let result = self.pdf.download_to(session.client(), &url, dest).await;
        permit.finish().await;
        result
    }

    /// Fetches the article page through the session and extracts its PDF link.
    #[instrument(skip(self, session))]
    async fn resolve_pdf_url(
        &self,
        source_url: &str,
        session: &Session,
    ) -> Result<String, DownloadError> {
        let permit = self.gate.acquire(session.id()).await;
        let fetched = self.page_fetcher.fetch(source_url, session).await;
        permit.finish().await;

        let page = fetched.map_err(|e| DownloadError::from_fetch(source_url, e))?;
        match self.classifier.classify(page.status, &page.body) {
            ResponseClass::Ok => {}
            ResponseClass::Challenge => {
                return Err(DownloadError::challenge(&page.url, page.status));
            }
            ResponseClass::Transient | ResponseClass::Permanent => {
                return Err(DownloadError::http_status(&page.url, page.status));
            }
        }

        let pdf_url = self
            .parser
            .parse_pdf_link(&page)
            .ok_or_else(|| DownloadError::MissingPdfLink {
                url: source_url.to_string(),
            })?;
        debug!(pdf_url = %pdf_url, "resolved PDF link from article page");
        Ok(pdf_url)
    }

    /// Parses a Retry-After header on a rate-limited error and defers the session by it.
    async fn extract_retry_after_delay(
        &self,
        error: &DownloadError,
        session: &Session,
    ) -> Option<Duration> {
        let header = match error {
            DownloadError::HttpStatus { retry_after, .. } => retry_after.as_ref()?,
            _ => return None,
        };
        let delay = parse_retry_after(header)?;
        self.gate.record_rate_limit(session.id(), delay).await;
        debug!(
            retry_after = %header,
            delay_ms = delay.as_millis(),
            "using Retry-After header delay"
        );
        Some(delay)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
