//! Response classification with first-class anti-bot challenge detection.
//!
//! Bot-mitigation interstitials are usually served with 403 or 503 and a
//! short HTML body, but some arrive as 200. Status alone is therefore not
//! enough: the classifier looks for body and title signatures before it
//! falls back to status-code semantics.
//!
//! | Condition | Class |
//! |-----------|-------|
//! | body or `<title>` carries a challenge signature | `Challenge` |
//! | 2xx | `Ok` |
//! | 408, 425, 429, 5xx | `Transient` |
//! | anything else | `Permanent` |

use std::fmt::Debug;

/// Lowercase body fragments that identify a challenge interstitial.
pub const DEFAULT_CHALLENGE_SIGNATURES: &[&str] = &[
    "just a moment...",
    "cf-chl-",
    "cf-browser-verification",
    "checking your browser",
    "attention required! | cloudflare",
    "_cf_chl_opt",
];

/// Lowercase title fragments that identify a challenge interstitial.
const CHALLENGE_TITLE_FRAGMENTS: &[&str] = &["just a moment", "attention required", "cloudflare"];

/// Classification of a fetched response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// Usable content.
    Ok,
    /// Anti-bot interstitial.
    Challenge,
    /// Failure that may clear on retry.
    Transient,
    /// Failure that will not clear on retry.
    Permanent,
}

/// Decides whether a response is usable, a challenge, or a failure.
///
/// Replaceable so deployments can track the site's current mitigation vendor.
pub trait ChallengeClassifier: Send + Sync + Debug {
    /// Classifies a response from its status code and (possibly truncated) body.
    fn classify(&self, status: u16, body: &str) -> ResponseClass;

    /// Whether the response is a challenge interstitial.
    fn is_challenge(&self, status: u16, body: &str) -> bool {
        self.classify(status, body) == ResponseClass::Challenge
    }
}

/// Signature-based classifier.
#[derive(Debug, Clone)]
pub struct SignatureClassifier {
    signatures: Vec<String>,
}

impl Default for SignatureClassifier {
    fn default() -> Self {
        Self {
            signatures: DEFAULT_CHALLENGE_SIGNATURES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl SignatureClassifier {
    /// Creates a classifier with the default signatures plus `extra`.
    #[must_use]
    pub fn with_extra_signatures<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classifier = Self::default();
        classifier.signatures.extend(
            extra
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty()),
        );
        classifier
    }

    /// Configured signatures.
    #[must_use]
    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    fn has_signature(&self, body: &str) -> bool {
        let lowered = body.to_lowercase();
        if self.signatures.iter().any(|s| lowered.contains(s.as_str())) {
            return true;
        }
        page_title(&lowered)
            .is_some_and(|title| CHALLENGE_TITLE_FRAGMENTS.iter().any(|f| title.contains(f)))
    }
}

impl ChallengeClassifier for SignatureClassifier {
    fn classify(&self, status: u16, body: &str) -> ResponseClass {
        if self.has_signature(body) {
            return ResponseClass::Challenge;
        }
        match status {
            200..=299 => ResponseClass::Ok,
            408 | 425 | 429 | 500..=599 => ResponseClass::Transient,
            _ => ResponseClass::Permanent,
        }
    }
}

/// Extracts the `<title>` text from an already-lowercased document.
fn page_title(lowered: &str) -> Option<&str> {
    let start = lowered.find("<title")?;
    let open_end = start + lowered[start..].find('>')? + 1;
    let close = open_end + lowered[open_end..].find("</title>")?;
    Some(lowered[open_end..close].trim())
}
