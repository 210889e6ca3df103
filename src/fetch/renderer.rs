//! Browser-rendering stand-in.

use async_trait::async_trait;
use tracing::debug;

use super::{FetchError, Fetcher, RawPage, Session};

/// Renderer used when no browser engine is linked into the process.
///
/// HTTP acquisition and the static journal list keep working without it;
/// only the rendering fallback reports failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRenderer;

#[async_trait]
impl Fetcher for UnavailableRenderer {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn fetch(&self, url: &str, session: &Session) -> Result<RawPage, FetchError> {
        debug!(url, headless = session.headless(), "browser rendering requested but unavailable");
        Err(FetchError::unavailable(
            "browser",
            "no rendering engine configured (HTTP-only mode)",
        ))
    }
}
