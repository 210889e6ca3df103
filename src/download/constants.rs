//! Constants for the download module (timeouts, politeness, payload validation).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (2 minutes; article PDFs are rarely above a few MB).
pub const READ_TIMEOUT_SECS: u64 = 120;

/// Default politeness interval between download requests (1 second).
pub const DEFAULT_POLITENESS_MS: u64 = 1000;

/// Warning threshold for cumulative politeness delay per session (30 seconds).
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Magic bytes every PDF starts with.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Smallest body accepted as a real PDF; anything shorter is an error page or stub.
pub const MIN_PDF_BYTES: u64 = 1000;

/// How much of a non-PDF body is inspected for challenge signatures.
pub const SNIFF_LIMIT_BYTES: usize = 64 * 1024;

/// Suffix for in-progress downloads; renamed away once validated.
pub const PARTIAL_SUFFIX: &str = "part";
