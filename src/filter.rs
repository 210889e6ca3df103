//! Acceptance rules for discovered articles.
//!
//! An article is downloaded only when it is open access and its publication
//! year lies inside the requested inclusive range. Accepted articles are
//! wrapped in [`AcceptedArticle`], which can only be built here, so the
//! download layer never sees an article that skipped the filter.

use tracing::trace;

use crate::model::{ArticleRecord, CrawlRequest};

/// Whether `article` passes the open-access and year-range rules of `request`.
#[must_use]
pub fn accept(article: &ArticleRecord, request: &CrawlRequest) -> bool {
    article.is_open_access
        && (request.year_from()..=request.year_to()).contains(&article.publication_year)
}

/// An article that passed [`accept`], tagged with its journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedArticle {
    journal: String,
    article: ArticleRecord,
}

impl AcceptedArticle {
    /// Journal slug the article was listed under.
    #[must_use]
    pub fn journal(&self) -> &str {
        &self.journal
    }

    /// The accepted article.
    #[must_use]
    pub fn article(&self) -> &ArticleRecord {
        &self.article
    }

    /// Splits into journal slug and article.
    #[must_use]
    pub fn into_inner(self) -> (String, ArticleRecord) {
        (self.journal, self.article)
    }
}

/// Wraps `article` if it passes the filter.
#[must_use]
pub fn admit(
    journal: &str,
    article: ArticleRecord,
    request: &CrawlRequest,
) -> Option<AcceptedArticle> {
    if accept(&article, request) {
        Some(AcceptedArticle {
            journal: journal.to_string(),
            article,
        })
    } else {
        trace!(
            journal,
            title = %article.title,
            year = article.publication_year,
            open_access = article.is_open_access,
            "article rejected by filter"
        );
        None
    }
}

/// Keeps the accepted subset of `articles`, preserving order.
#[must_use]
pub fn filter_articles(
    journal: &str,
    articles: Vec<ArticleRecord>,
    request: &CrawlRequest,
) -> Vec<AcceptedArticle> {
    articles
        .into_iter()
        .filter_map(|article| admit(journal, article, request))
        .collect()
}
