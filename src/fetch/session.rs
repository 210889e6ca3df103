//! Shared browser-like session: cookies, consent state and HTTP client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use reqwest::cookie::Jar;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{FetchError, build_client};
use crate::config::CrawlerConfig;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Cookie-consent banner state accepted up front so pages render without the overlay.
const CONSENT_COOKIES: &[&str] = &[
    "OptanonAlertBoxClosed={now}; Path=/",
    "OptanonConsent=isGpcEnabled=0&datestamp={now}&groups=C0001%3A1%2CC0002%3A0%2CC0003%3A0%2CC0004%3A0; Path=/",
];

/// State shared by every request of one crawl run.
///
/// Holds the cookie jar (consent and any challenge clearance cookies the site
/// hands out), the HTTP client bound to that jar, and the rendering mode.
/// Politeness is enforced per session id.
#[derive(Debug)]
pub struct Session {
    id: u64,
    base_url: Url,
    jar: Arc<Jar>,
    client: Client,
    headless: bool,
    warmed: OnceCell<bool>,
}

impl Session {
    /// Creates a session for `config.base_url` with consent cookies seeded.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] for an unparsable base URL and
    /// [`FetchError::ClientBuild`] when the HTTP client cannot be built.
    #[instrument(skip(config), fields(base_url = %config.base_url))]
    pub fn new(config: &CrawlerConfig, headless: bool) -> Result<Self, FetchError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|_| FetchError::invalid_url(&config.base_url))?;
        let jar = Arc::new(Jar::default());
        seed_consent_cookies(&jar, &base_url);

        let client = build_client(Arc::clone(&jar), config.connect_timeout, config.read_timeout)
            .map_err(|source| FetchError::ClientBuild { source })?;

        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst);
        debug!(session = id, headless, "session created");
        Ok(Self {
            id,
            base_url,
            jar,
            client,
            headless,
            warmed: OnceCell::new(),
        })
    }

    /// Process-unique session id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Site root this session talks to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// HTTP client bound to the session cookie jar.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Cookie jar shared with any rendering fetcher.
    #[must_use]
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    /// Whether browser rendering should run headless.
    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    /// Visits the site root once so the server can set session cookies.
    ///
    /// Best effort and idempotent: later calls return the first result
    /// without issuing another request. Returns whether the visit succeeded.
    #[instrument(skip(self), fields(session = self.id))]
    pub async fn establish(&self) -> bool {
        *self
            .warmed
            .get_or_init(|| async {
                match self.client.get(self.base_url.as_str()).send().await {
                    Ok(response) if response.status().is_success() => {
                        info!(status = response.status().as_u16(), "session established");
                        true
                    }
                    Ok(response) => {
                        warn!(
                            status = response.status().as_u16(),
                            "session warm-up returned non-success status; continuing"
                        );
                        false
                    }
                    Err(e) => {
                        warn!(error = %e, "session warm-up failed; continuing");
                        false
                    }
                }
            })
            .await
    }
}

fn seed_consent_cookies(jar: &Jar, base_url: &Url) {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    for template in CONSENT_COOKIES {
        jar.add_cookie_str(&template.replace("{now}", &now), base_url);
    }
}
