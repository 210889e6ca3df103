//! Versioned selector sets for the site's markup generations.

/// CSS selectors describing one generation of the site's markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkupProfile {
    /// Name recorded on parsed listings.
    pub name: &'static str,
    /// Anchors in the journal navigation menu.
    pub journal_links: &'static str,
    /// One element per article on a listing page.
    pub article_item: &'static str,
    /// Title element within an article item.
    pub title: &'static str,
    /// Element whose text carries the publication date.
    pub date: &'static str,
    /// PDF anchor within an article item.
    pub pdf_link: &'static str,
    /// Open-access marker within an article item.
    pub open_access: &'static str,
    /// Full-text or abstract anchor within an article item.
    pub article_link: &'static str,
    /// Next-page `<link>` or anchor on a listing page.
    pub next_page: &'static str,
}

/// Layout served since the navigation redesign (mega-menu panels, `toc__item` listings).
pub const CURRENT_PROFILE: MarkupProfile = MarkupProfile {
    name: "current",
    journal_links: "#main-menu-panel-1 a.sub-menu__item-link",
    article_item: ".articleCitation",
    title: ".toc__item__title",
    date: ".toc__item__date",
    pdf_link: "a.pdfLink",
    open_access: ".OALabel",
    article_link: "a[href*='/fulltext/']",
    next_page: "link[rel='next'], a[rel='next'], .pagination__btn--next",
};

/// Older Literatum layout (search-result style listings, flat `/{slug}/home` links).
pub const LEGACY_PROFILE: MarkupProfile = MarkupProfile {
    name: "legacy",
    journal_links: "a[href$='/home']",
    article_item: "article.literatumArticle, div.article",
    title: "h3, h2, [class*='title']",
    date: "[class*='year'], [class*='date']",
    pdf_link: "a[href*='pdf']",
    open_access: "[class*='open-access'], [class*='openAccess'], .OALabel",
    article_link: "a[href*='/fulltext/'], a[href*='/abstract/']",
    next_page: "link[rel='next'], a[rel='next'], a.next",
};
