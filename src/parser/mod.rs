//! Structured extraction from journal menus, listings and article pages.
//!
//! # Overview
//!
//! [`PageParser`] is a pure contract: no network, no filesystem. The shipped
//! implementation, [`CellParser`], holds an ordered list of
//! [`MarkupProfile`]s (current layout first, older layouts after) and uses
//! the first profile that recognises a page. When none does, the page is a
//! structural mismatch ([`ParseError::Structural`]); when a profile matches but
//! an entry lacks a field, only that entry degrades or is skipped.
//!
//! # Example
//!
//! ```
//! use crawler_core::fetch::RawPage;
//! use crawler_core::parser::{CellParser, PageParser};
//!
//! let parser = CellParser::new().expect("built-in selectors are valid");
//! let page = RawPage::ok(
//!     "https://www.cell.com/",
//!     r#"<div id="main-menu-panel-1"><a class="sub-menu__item-link" href="/neuron/home">Neuron</a></div>"#,
//! );
//! let journals = parser.parse_journals(&page).expect("menu is recognised");
//! assert_eq!(journals[0].slug, "neuron");
//! ```

mod cell;
mod profile;

use std::fmt::Debug;

use thiserror::Error;

use crate::fetch::RawPage;
use crate::model::{ArticleRecord, JournalRef};

pub use cell::CellParser;
pub use profile::{CURRENT_PROFILE, LEGACY_PROFILE, MarkupProfile};

/// Errors raised by page parsers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No known markup profile recognised the page.
    #[error("unrecognized {what} structure at {url}")]
    Structural {
        /// What the page was expected to contain.
        what: &'static str,
        /// Page URL.
        url: String,
    },

    /// A profile selector failed to compile.
    #[error("invalid selector {selector:?}: {message}")]
    Selector {
        /// Selector source.
        selector: String,
        /// Compiler message.
        message: String,
    },
}

impl ParseError {
    /// Creates a structural mismatch error.
    pub fn structural(what: &'static str, url: impl Into<String>) -> Self {
        Self::Structural {
            what,
            url: url.into(),
        }
    }
}

/// Articles parsed from one listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleListing {
    /// Well-formed entries in page order.
    pub articles: Vec<ArticleRecord>,
    /// Absolute URL of the next listing page, if linked.
    pub next_page: Option<String>,
    /// Entries dropped for lacking a year or a usable link.
    pub skipped: usize,
    /// Name of the markup profile that recognised the page.
    pub profile: &'static str,
}

/// Turns raw pages into structured records.
pub trait PageParser: Send + Sync + Debug {
    /// Parses the journal navigation menu.
    ///
    /// # Errors
    ///
    /// [`ParseError::Structural`] when no journal links are recognised.
    fn parse_journals(&self, page: &RawPage) -> Result<Vec<JournalRef>, ParseError>;

    /// Parses one article listing page.
    ///
    /// # Errors
    ///
    /// [`ParseError::Structural`] when no article entries are recognised.
    fn parse_articles(&self, page: &RawPage) -> Result<ArticleListing, ParseError>;

    /// Extracts the PDF link from an article page, resolved to an absolute URL.
    fn parse_pdf_link(&self, page: &RawPage) -> Option<String>;
}
