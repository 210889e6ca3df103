//! Shared User-Agent string for site and PDF requests.
//!
//! The target site serves challenge pages to obviously scripted clients, so the
//! header leads with a mainstream browser token and still names the tool and
//! its project URL (RFC 9308 good citizenship).

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/papers-crawler";

/// Browser token the tool presents first.
pub const BROWSER_UA_TOKEN: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default User-Agent for every request issued by a crawl session.
#[must_use]
pub fn default_crawler_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{BROWSER_UA_TOKEN} papers-crawler/{version} (+{PROJECT_UA_URL})")
}
