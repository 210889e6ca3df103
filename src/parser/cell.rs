//! Parser for Cell Press journal pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};
use url::Url;

use super::profile::{CURRENT_PROFILE, LEGACY_PROFILE, MarkupProfile};
use super::{ArticleListing, PageParser, ParseError};
use crate::fetch::RawPage;
use crate::model::{ArticleRecord, JournalRef};

/// `/{slug}/home` or `/{group}/{slug}/home` (partner journals).
#[allow(clippy::expect_used)]
static JOURNAL_HOME_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([a-z0-9][a-z0-9\-]*(?:/[a-z0-9][a-z0-9\-]*)?)/home/?$")
        .expect("journal home regex is valid") // Static pattern, safe to panic
});

/// Bare `/{slug}` links used by some menu entries.
#[allow(clippy::expect_used)]
static JOURNAL_ROOT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([a-z0-9][a-z0-9\-]*)/?$").expect("journal root regex is valid") // Static pattern, safe to panic
});

/// Site-level paths that look like journal links but are not journals.
const RESERVED_SEGMENTS: &[&str] = &[
    "home", "about", "action", "search", "login", "help", "contact", "pb-assets",
];

/// Trailing `(…)` qualifiers on menu names, e.g. `Heliyon (partner)`.
#[allow(clippy::expect_used)]
static TRAILING_PAREN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\([^()]*\)\s*$").expect("paren regex is valid") // Static pattern, safe to panic
});

/// Trailing `partner` marker on menu names.
#[allow(clippy::expect_used)]
static TRAILING_PARTNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+partner\s*$").expect("partner regex is valid") // Static pattern, safe to panic
});

/// Four-digit publication year.
#[allow(clippy::expect_used)]
static YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year regex is valid") // Static pattern, safe to panic
});

#[derive(Debug)]
struct CompiledProfile {
    name: &'static str,
    journal_links: Selector,
    article_item: Selector,
    title: Selector,
    date: Selector,
    pdf_link: Selector,
    open_access: Selector,
    article_link: Selector,
    next_page: Selector,
}

impl CompiledProfile {
    fn compile(profile: &MarkupProfile) -> Result<Self, ParseError> {
        Ok(Self {
            name: profile.name,
            journal_links: parse_selector(profile.journal_links)?,
            article_item: parse_selector(profile.article_item)?,
            title: parse_selector(profile.title)?,
            date: parse_selector(profile.date)?,
            pdf_link: parse_selector(profile.pdf_link)?,
            open_access: parse_selector(profile.open_access)?,
            article_link: parse_selector(profile.article_link)?,
            next_page: parse_selector(profile.next_page)?,
        })
    }
}

/// Parser for Cell Press menus, listings and article pages.
#[derive(Debug)]
pub struct CellParser {
    profiles: Vec<CompiledProfile>,
    anchor: Selector,
    pdf_meta: Selector,
    pdf_anchors: Vec<Selector>,
}

impl CellParser {
    /// Creates a parser with the current profile followed by the legacy one.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Selector`] if a built-in selector fails to compile.
    pub fn new() -> Result<Self, ParseError> {
        Self::with_profiles(&[CURRENT_PROFILE, LEGACY_PROFILE])
    }

    /// Creates a parser trying `profiles` in order.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Selector`] for the first selector that fails to compile.
    pub fn with_profiles(profiles: &[MarkupProfile]) -> Result<Self, ParseError> {
        let profiles = profiles
            .iter()
            .map(CompiledProfile::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            profiles,
            anchor: parse_selector("a[href]")?,
            pdf_meta: parse_selector("meta[name='citation_pdf_url']")?,
            pdf_anchors: vec![
                parse_selector("a.pdfLink[href]")?,
                parse_selector("a[href*='/pdf/']")?,
                parse_selector("a[href$='.pdf']")?,
            ],
        })
    }

    fn parse_item(
        &self,
        profile: &CompiledProfile,
        item: ElementRef<'_>,
        index: usize,
        base: Option<&Url>,
    ) -> Option<ArticleRecord> {
        let title = item
            .select(&profile.title)
            .map(collapsed_text)
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| format!("Article {}", index + 1));

        let Some(publication_year) = item
            .select(&profile.date)
            .map(collapsed_text)
            .find_map(|t| extract_year(&t))
        else {
            trace!(title = %title, "entry has no publication year, skipping");
            return None;
        };

        let pdf_url = first_href(item.select(&profile.pdf_link), base);
        let is_open_access = item.select(&profile.open_access).next().is_some();

        let source_url = first_href(item.select(&profile.article_link), base)
            .or_else(|| {
                let full_text = item
                    .select(&self.anchor)
                    .filter(|a| collapsed_text(*a).to_lowercase().contains("full-text html"));
                first_href(full_text, base)
            })
            .or_else(|| {
                let title_links = item
                    .select(&profile.title)
                    .flat_map(|t| std::iter::once(t).chain(t.select(&self.anchor)));
                first_href(title_links, base)
            })
            .or_else(|| pdf_url.clone());

        let Some(source_url) = source_url else {
            trace!(title = %title, "entry has no usable link, skipping");
            return None;
        };

        Some(ArticleRecord {
            title,
            source_url,
            publication_year,
            is_open_access,
            pdf_url,
        })
    }
}

impl PageParser for CellParser {
    fn parse_journals(&self, page: &RawPage) -> Result<Vec<JournalRef>, ParseError> {
        let document = Html::parse_document(&page.body);
        let base = Url::parse(&page.url).ok();

        for profile in &self.profiles {
            let mut seen = HashSet::new();
            let mut journals = Vec::new();

            for anchor in document.select(&profile.journal_links) {
                let Some(slug) = anchor
                    .value()
                    .attr("href")
                    .and_then(|href| slug_from_href(href, base.as_ref()))
                else {
                    continue;
                };
                if !seen.insert(slug.clone()) {
                    continue;
                }
                let name = clean_journal_name(&collapsed_text(anchor));
                let name = if name.is_empty() { slug.clone() } else { name };
                journals.push(JournalRef::new(slug, name));
            }

            if !journals.is_empty() {
                debug!(profile = profile.name, count = journals.len(), "parsed journal menu");
                return Ok(journals);
            }
        }

        Err(ParseError::structural("journal menu", &page.url))
    }

    fn parse_articles(&self, page: &RawPage) -> Result<ArticleListing, ParseError> {
        let document = Html::parse_document(&page.body);
        let base = Url::parse(&page.url).ok();

        for profile in &self.profiles {
            let items: Vec<ElementRef<'_>> = document.select(&profile.article_item).collect();
            if items.is_empty() {
                continue;
            }

            let mut listing = ArticleListing {
                profile: profile.name,
                ..ArticleListing::default()
            };
            let mut seen = HashSet::new();
            for (index, item) in items.into_iter().enumerate() {
                match self.parse_item(profile, item, index, base.as_ref()) {
                    Some(article) if seen.insert(article.source_url.clone()) => {
                        listing.articles.push(article);
                    }
                    Some(article) => {
                        trace!(url = %article.source_url, "duplicate entry on page");
                    }
                    None => listing.skipped += 1,
                }
            }

            listing.next_page = first_href(document.select(&profile.next_page), base.as_ref())
                .filter(|next| next != &page.url);

            debug!(
                profile = profile.name,
                articles = listing.articles.len(),
                skipped = listing.skipped,
                has_next = listing.next_page.is_some(),
                "parsed article listing"
            );
            return Ok(listing);
        }

        Err(ParseError::structural("article listing", &page.url))
    }

    fn parse_pdf_link(&self, page: &RawPage) -> Option<String> {
        let document = Html::parse_document(&page.body);
        let base = Url::parse(&page.url).ok();

        let from_meta = document
            .select(&self.pdf_meta)
            .filter_map(|meta| meta.value().attr("content"))
            .find_map(|content| resolve_href(content, base.as_ref()));
        if from_meta.is_some() {
            return from_meta;
        }

        self.pdf_anchors
            .iter()
            .find_map(|selector| first_href(document.select(selector), base.as_ref()))
    }
}

fn parse_selector(source: &str) -> Result<Selector, ParseError> {
    Selector::parse(source).map_err(|e| ParseError::Selector {
        selector: source.to_string(),
        message: format!("{e:?}"),
    })
}

fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_href<'a>(
    elements: impl Iterator<Item = ElementRef<'a>>,
    base: Option<&Url>,
) -> Option<String> {
    elements
        .filter_map(|element| element.value().attr("href"))
        .find_map(|href| resolve_href(href, base))
}

fn resolve_href(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn slug_from_href(href: &str, base: Option<&Url>) -> Option<String> {
    let path = match base {
        Some(base) => {
            let resolved = base.join(href.trim()).ok()?;
            if resolved.host_str() != base.host_str() {
                return None;
            }
            resolved.path().to_lowercase()
        }
        None if href.starts_with('/') => href
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_lowercase(),
        None => return None,
    };

    JOURNAL_HOME_PATH
        .captures(&path)
        .or_else(|| JOURNAL_ROOT_PATH.captures(&path))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|slug| {
            let first = slug.split('/').next().unwrap_or_default();
            !RESERVED_SEGMENTS.contains(&first)
        })
        .map(str::to_string)
}

fn clean_journal_name(raw: &str) -> String {
    let mut name = raw.trim().to_string();
    loop {
        let stripped = TRAILING_PAREN.replace(&name, "");
        let stripped = TRAILING_PARTNER.replace(&stripped, "").trim().to_string();
        if stripped == name {
            return name;
        }
        name = stripped;
    }
}

fn extract_year(text: &str) -> Option<i32> {
    YEAR.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parser() -> CellParser {
        CellParser::new().unwrap()
    }

    const MENU: &str = r#"<html><body>
        <div id="main-menu-panel-1">
          <a class="sub-menu__item-link" href="/cell/home">Cell</a>
          <a class="sub-menu__item-link" href="/heliyon/cell-press/home">Heliyon (partner)</a>
          <a class="sub-menu__item-link" href="https://www.cell.com/neuron/home"> Neuron
             </a>
          <a class="sub-menu__item-link" href="/cell/home">Cell again</a>
          <a class="sub-menu__item-link" href="/the-innovation">The Innovation partner</a>
          <a class="sub-menu__item-link" href="https://elsevier.com/other/home">Elsewhere</a>
        </div>
        <a href="/about/home">Not in menu</a>
      </body></html>"#;

    const LISTING: &str = r#"<html><body><ul class="toc__list">
        <li class="articleCitation">
          <h3 class="toc__item__title"><a href="/cell/fulltext/S0092-8674(21)00001-1">Open 2021</a></h3>
          <div class="toc__item__date">Published: March 3, 2021</div>
          <span class="OALabel">Open Access</span>
          <a class="pdfLink" href="/cell/pdf/S0092-8674(21)00001-1.pdf">PDF</a>
        </li>
        <li class="articleCitation">
          <h3 class="toc__item__title">Open 2022</h3>
          <div class="toc__item__date">January 2022</div>
          <span class="OALabel">Open Access</span>
          <a href="/cell/fulltext/S0092-8674(22)00002-2">Full-Text HTML</a>
        </li>
        <li class="articleCitation">
          <div class="toc__item__date">2022</div>
          <a href="/cell/fulltext/S0092-8674(22)00003-3">Full text</a>
        </li>
        <li class="articleCitation">
          <h3 class="toc__item__title"><a href="/cell/fulltext/X">No date</a></h3>
        </li>
      </ul>
      <a class="pagination__btn--next" href="/cell/newarticles?startPage=1">Next</a>
      </body></html>"#;

    // ==================== Journal Menu Tests ====================

    #[test]
    fn test_parse_journals_current_menu() {
        let page = RawPage::ok("https://www.cell.com/", MENU);
        let journals = parser().parse_journals(&page).unwrap();
        let slugs: Vec<&str> = journals.iter().map(|j| j.slug.as_str()).collect();
        assert_eq!(
            slugs,
            ["cell", "heliyon/cell-press", "neuron", "the-innovation"]
        );
        assert_eq!(journals[1].display_name, "Heliyon");
        assert_eq!(journals[2].display_name, "Neuron");
        assert_eq!(journals[3].display_name, "The Innovation");
    }

    #[test]
    fn test_parse_journals_legacy_links() {
        let body = r#"<nav><a href="/immunity/home">Immunity</a><a href="/joule/home">Joule</a></nav>"#;
        let page = RawPage::ok("https://www.cell.com/", body);
        let journals = parser().parse_journals(&page).unwrap();
        assert_eq!(journals.len(), 2);
        assert_eq!(journals[0], JournalRef::new("immunity", "Immunity"));
    }

    #[test]
    fn test_parse_journals_legacy_ignores_site_home() {
        let body = r#"<nav>
            <a href="/home">Home</a>
            <a href="/cell/home">Cell</a>
            <a href="/about/home">About</a>
            <a href="/neuron/home">Neuron</a>
          </nav>"#;
        let page = RawPage::ok("https://www.cell.com/", body);
        let journals = parser().parse_journals(&page).unwrap();
        let slugs: Vec<&str> = journals.iter().map(|j| j.slug.as_str()).collect();
        assert_eq!(slugs, ["cell", "neuron"]);
    }

    #[test]
    fn test_parse_journals_only_site_links_is_structural() {
        let body = r#"<nav><a href="/home">Home</a><a href="/search/home">Search</a></nav>"#;
        let page = RawPage::ok("https://www.cell.com/", body);
        assert!(parser().parse_journals(&page).is_err());
    }

    #[test]
    fn test_parse_journals_structural_error() {
        let page = RawPage::ok("https://www.cell.com/", "<html><body><p>maintenance</p></body></html>");
        let err = parser().parse_journals(&page).unwrap_err();
        assert!(matches!(err, ParseError::Structural { what: "journal menu", .. }));
    }

    // ==================== Listing Tests ====================

    #[test]
    fn test_parse_articles_current_listing() {
        let page = RawPage::ok("https://www.cell.com/cell/newarticles", LISTING);
        let listing = parser().parse_articles(&page).unwrap();

        assert_eq!(listing.profile, "current");
        assert_eq!(listing.articles.len(), 3);
        assert_eq!(listing.skipped, 1);

        let first = &listing.articles[0];
        assert_eq!(first.title, "Open 2021");
        assert_eq!(first.publication_year, 2021);
        assert!(first.is_open_access);
        assert_eq!(
            first.pdf_url.as_deref(),
            Some("https://www.cell.com/cell/pdf/S0092-8674(21)00001-1.pdf")
        );
        assert_eq!(
            first.source_url,
            "https://www.cell.com/cell/fulltext/S0092-8674(21)00001-1"
        );

        let second = &listing.articles[1];
        assert_eq!(second.publication_year, 2022);
        assert!(second.pdf_url.is_none());

        let third = &listing.articles[2];
        assert_eq!(third.title, "Article 3");
        assert!(!third.is_open_access);

        assert_eq!(
            listing.next_page.as_deref(),
            Some("https://www.cell.com/cell/newarticles?startPage=1")
        );
    }

    #[test]
    fn test_parse_articles_legacy_listing() {
        let body = r#"<div class="search-results">
            <article class="literatumArticle">
              <h3>Legacy Paper</h3>
              <span class="pub-year">2019</span>
              <span class="open-access-icon"></span>
              <a href="/cell/pdf/legacy.pdf">Download PDF</a>
            </article>
          </div>"#;
        let page = RawPage::ok("https://www.cell.com/cell/newarticles", body);
        let listing = parser().parse_articles(&page).unwrap();
        assert_eq!(listing.profile, "legacy");
        assert_eq!(listing.articles.len(), 1);
        let article = &listing.articles[0];
        assert_eq!(article.title, "Legacy Paper");
        assert_eq!(article.publication_year, 2019);
        assert!(article.is_open_access);
        assert_eq!(article.source_url, "https://www.cell.com/cell/pdf/legacy.pdf");
        assert!(listing.next_page.is_none());
    }

    #[test]
    fn test_parse_articles_next_page_from_link_rel() {
        let body = r#"<html><head>
            <link rel="next" href="/cell/newarticles?startPage=2">
            </head><body>
            <div class="articleCitation"><div class="toc__item__date">2022</div>
              <a href="/cell/fulltext/A">x</a></div>
            </body></html>"#;
        let page = RawPage::ok("https://www.cell.com/cell/newarticles?startPage=1", body);
        let listing = parser().parse_articles(&page).unwrap();
        assert_eq!(
            listing.next_page.as_deref(),
            Some("https://www.cell.com/cell/newarticles?startPage=2")
        );
    }

    #[test]
    fn test_parse_articles_legacy_next_page_from_link_rel() {
        let body = r#"<html><head><link rel="next" href="?page=3"></head><body>
            <article class="literatumArticle"><h3>Legacy</h3><span class="pub-year">2020</span>
              <a href="/cell/fulltext/L1">Full text</a></article>
            </body></html>"#;
        let page = RawPage::ok("https://www.cell.com/cell/newarticles?page=2", body);
        let listing = parser().parse_articles(&page).unwrap();
        assert_eq!(listing.profile, "legacy");
        assert_eq!(
            listing.next_page.as_deref(),
            Some("https://www.cell.com/cell/newarticles?page=3")
        );
    }

    #[test]
    fn test_parse_articles_structural_error() {
        let page = RawPage::ok("https://www.cell.com/cell/newarticles", "<html><body></body></html>");
        let err = parser().parse_articles(&page).unwrap_err();
        assert!(matches!(err, ParseError::Structural { what: "article listing", .. }));
    }

    #[test]
    fn test_parse_articles_dedupes_within_page() {
        let body = r#"
            <div class="articleCitation"><div class="toc__item__date">2022</div>
              <a href="/cell/fulltext/A">x</a></div>
            <div class="articleCitation"><div class="toc__item__date">2022</div>
              <a href="/cell/fulltext/A">x</a></div>"#;
        let page = RawPage::ok("https://www.cell.com/cell/newarticles", body);
        let listing = parser().parse_articles(&page).unwrap();
        assert_eq!(listing.articles.len(), 1);
    }

    // ==================== Article Page Tests ====================

    #[test]
    fn test_parse_pdf_link_prefers_meta() {
        let body = r#"<html><head>
            <meta name="citation_pdf_url" content="https://www.cell.com/cell/pdf/A.pdf">
            </head><body><a class="pdfLink" href="/cell/pdf/B.pdf">PDF</a></body></html>"#;
        let page = RawPage::ok("https://www.cell.com/cell/fulltext/A", body);
        assert_eq!(
            parser().parse_pdf_link(&page).as_deref(),
            Some("https://www.cell.com/cell/pdf/A.pdf")
        );
    }

    #[test]
    fn test_parse_pdf_link_from_anchor() {
        let body = r#"<a href="/cell/pdf/B.pdf" class="pdfLink">PDF</a>"#;
        let page = RawPage::ok("https://www.cell.com/cell/fulltext/B", body);
        assert_eq!(
            parser().parse_pdf_link(&page).as_deref(),
            Some("https://www.cell.com/cell/pdf/B.pdf")
        );
    }

    #[test]
    fn test_parse_pdf_link_absent() {
        let page = RawPage::ok("https://www.cell.com/cell/fulltext/C", "<p>no pdf</p>");
        assert!(parser().parse_pdf_link(&page).is_none());
    }

    // ==================== Helper Tests ====================

    #[test]
    fn test_invalid_profile_selector_is_reported() {
        let broken = MarkupProfile {
            article_item: "[[invalid",
            ..CURRENT_PROFILE
        };
        let err = CellParser::with_profiles(&[broken]).unwrap_err();
        assert!(matches!(err, ParseError::Selector { .. }));
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("Published: March 3, 2021"), Some(2021));
        assert_eq!(extract_year("Online 12345"), None);
        assert_eq!(extract_year("no date"), None);
    }

    #[test]
    fn test_clean_journal_name() {
        assert_eq!(clean_journal_name("Heliyon (partner)"), "Heliyon");
        assert_eq!(clean_journal_name("One Earth (Cell Press) (new)"), "One Earth");
        assert_eq!(clean_journal_name("The Innovation partner"), "The Innovation");
        assert_eq!(clean_journal_name("Cell"), "Cell");
    }

    #[test]
    fn test_slug_from_href() {
        let base = Url::parse("https://www.cell.com/").unwrap();
        assert_eq!(slug_from_href("/cell/home", Some(&base)).as_deref(), Some("cell"));
        assert_eq!(
            slug_from_href("/Cell-Reports/home?x=1", Some(&base)).as_deref(),
            Some("cell-reports")
        );
        assert_eq!(slug_from_href("https://other.org/cell/home", Some(&base)), None);
        assert_eq!(slug_from_href("/a/b/c/home", Some(&base)), None);
        assert_eq!(slug_from_href("/cell/home", None).as_deref(), Some("cell"));
        assert_eq!(slug_from_href("/home", Some(&base)), None);
        assert_eq!(slug_from_href("/about/home", Some(&base)), None);
    }
}
