//! Shared helpers for integration tests.
#![allow(dead_code)]

pub mod socket_guard;

use std::time::Duration;

use crawler_core::CrawlerConfig;

/// Reads a file from `tests/fixtures`.
pub fn fixture(name: &str) -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read fixture {}: {e}", path.display()))
}

/// A body that passes the `%PDF` magic and minimum-size checks.
pub fn pdf_body() -> Vec<u8> {
    let mut body = b"%PDF-1.7\n".to_vec();
    body.extend(std::iter::repeat_n(b'x', 4096));
    body.extend_from_slice(b"\n%%EOF\n");
    body
}

/// Config pointed at a mock server with fast retries and no politeness delay.
pub fn test_config(base_url: &str) -> CrawlerConfig {
    CrawlerConfig {
        base_url: base_url.to_string(),
        politeness: Duration::ZERO,
        max_retries: 3,
        retry_base_delay: Duration::from_millis(10),
        retry_max_delay: Duration::from_millis(50),
        retry_jitter: Duration::ZERO,
        connect_timeout: Duration::from_secs(5),
        read_timeout: Duration::from_secs(10),
        min_pdf_bytes: 64,
        ..CrawlerConfig::default()
    }
}
