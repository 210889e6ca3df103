//! Discovery tasks and the ordered strategy fallback chain.
//!
//! # Overview
//!
//! A [`DiscoveryTask`] asks for either the journal list or one page of a
//! journal's article listing. The [`StrategyExecutor`] runs an ordered list
//! of [`Strategy`] objects for the task, strictly one at a time:
//!
//! 1. [`FetcherStrategy::http`] - plain HTTP request ([`CacheSource::Primary`])
//! 2. [`FetcherStrategy::browser`] - browser rendering ([`CacheSource::Fallback`])
//! 3. [`StaticJournalStrategy`] - built-in journal list, journal discovery only
//!    ([`CacheSource::Static`])
//!
//! The first strategy whose page is accepted wins. Challenge pages are
//! recognised by a [`ChallengeClassifier`] and recorded as a distinct failure
//! kind so operators can tell bot mitigation apart from outages.
//!
//! [`CacheSource::Primary`]: crate::cache::CacheSource::Primary
//! [`CacheSource::Fallback`]: crate::cache::CacheSource::Fallback
//! [`CacheSource::Static`]: crate::cache::CacheSource::Static

mod challenge;
mod executor;
mod strategy;

use std::fmt;

pub use challenge::{
    ChallengeClassifier, DEFAULT_CHALLENGE_SIGNATURES, ResponseClass, SignatureClassifier,
};
pub use executor::{DiscoveredPage, DiscoveryError, StrategyExecutor, StrategyFailure};
pub use strategy::{
    DEFAULT_STATIC_JOURNALS, FetcherStrategy, StaticJournalStrategy, Strategy, StrategyError,
};

/// URL layout of the target site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    base: String,
}

impl SiteLayout {
    /// Creates a layout rooted at `base_url` (trailing slashes are ignored).
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Site root without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Page carrying the journal navigation menu.
    #[must_use]
    pub fn home_url(&self) -> String {
        format!("{}/", self.base)
    }

    /// First page of a journal's newest-articles listing.
    #[must_use]
    pub fn listing_url(&self, slug: &str) -> String {
        format!("{}/{slug}/newarticles", self.base)
    }
}

/// A request to obtain one discovery page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiscoveryTask {
    /// The site's journal list.
    Journals,
    /// One page of a journal's article listing.
    Articles {
        /// Journal slug.
        slug: String,
        /// Zero-based page index.
        page: usize,
        /// Explicit page URL (from a previous page's next link); `None` for the first page.
        url: Option<String>,
    },
}

impl DiscoveryTask {
    /// Task for the first listing page of `slug`.
    #[must_use]
    pub fn first_listing(slug: impl Into<String>) -> Self {
        Self::Articles {
            slug: slug.into(),
            page: 0,
            url: None,
        }
    }

    /// Identity key used by the cache store.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self {
            Self::Journals => "journals".to_string(),
            Self::Articles { slug, page, .. } => format!("articles:{slug}:{page}"),
        }
    }

    /// URL to fetch for this task.
    #[must_use]
    pub fn url(&self, layout: &SiteLayout) -> String {
        match self {
            Self::Journals => layout.home_url(),
            Self::Articles { url: Some(url), .. } => url.clone(),
            Self::Articles { slug, .. } => layout.listing_url(slug),
        }
    }

    /// Whether this is journal discovery.
    #[must_use]
    pub fn is_journals(&self) -> bool {
        matches!(self, Self::Journals)
    }
}

impl fmt::Display for DiscoveryTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}
