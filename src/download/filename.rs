//! Deterministic, filesystem-safe paths for downloaded articles.
//!
//! Layout: `{out_folder}/{journal}/{year}_{title}_{hash}.pdf`, where `hash`
//! is the first 8 hex digits of SHA-256 over the article's source URL. The
//! same article therefore always maps to the same file, which is what lets a
//! rerun recognise completed work, while two articles with equal titles still
//! get distinct names.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::model::ArticleRecord;

/// Maximum characters kept from a title.
const MAX_TITLE_CHARS: usize = 80;

/// Hex digits of the URL hash kept in the filename.
const HASH_HEX_DIGITS: usize = 8;

/// Replaces path separators, reserved and control characters with `_`,
/// collapsing runs and trimming separators and dots from the ends.
pub(crate) fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\'' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    out.trim_matches(|c| c == '_' || c == '.').to_string()
}

/// Sanitized, length-capped title; `article` when nothing usable remains.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let cleaned = sanitize_filename_component(title);
    let truncated: String = cleaned.chars().take(MAX_TITLE_CHARS).collect();
    let truncated = truncated.trim_end_matches(['_', '.']);
    if truncated.is_empty() {
        "article".to_string()
    } else {
        truncated.to_string()
    }
}

/// Filename for `article`.
#[must_use]
pub fn article_filename(article: &ArticleRecord) -> String {
    let digest = Sha256::digest(article.source_url.as_bytes());
    let mut hash = String::with_capacity(HASH_HEX_DIGITS);
    for byte in digest.iter().take(HASH_HEX_DIGITS / 2) {
        let _ = write!(hash, "{byte:02x}");
    }
    format!(
        "{}_{}_{hash}.pdf",
        article.publication_year,
        sanitize_title(&article.title)
    )
}

/// Directory holding one journal's downloads.
#[must_use]
pub fn journal_folder(out_folder: &Path, journal: &str) -> PathBuf {
    let name = sanitize_filename_component(&journal.replace('/', "_"));
    let name = if name.is_empty() { "journal".to_string() } else { name };
    out_folder.join(name)
}

/// Final path of `article` under `out_folder`.
#[must_use]
pub fn article_path(out_folder: &Path, journal: &str, article: &ArticleRecord) -> PathBuf {
    journal_folder(out_folder, journal).join(article_filename(article))
}
