//! Per-session politeness gate for download requests.
//!
//! # Overview
//!
//! Every request a [`Session`](crate::fetch::Session) makes against the site
//! for a PDF (or the article page used to find one) passes through the gate.
//! Consecutive requests of one session are spaced at least `interval` apart,
//! measured from the later of the previous request's start and its
//! completion. Sessions never wait for each other.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use crawler_core::download::PolitenessGate;
//!
//! # async fn example() {
//! let gate = PolitenessGate::new(Duration::from_millis(500));
//!
//! // First request of session 1 proceeds immediately
//! let permit = gate.acquire(1).await;
//! // ... request ...
//! permit.finish().await;
//!
//! // Next request of session 1 waits until 500ms after completion
//! gate.acquire(1).await.finish().await;
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::{CUMULATIVE_DELAY_WARNING_THRESHOLD, MAX_RETRY_AFTER};

/// Per-session spacing of download requests.
///
/// Wrap in `Arc` to share across download tasks.
#[derive(Debug)]
pub struct PolitenessGate {
    interval: Duration,
    disabled: bool,
    /// Arc so the `DashMap` shard lock is released before awaiting the inner mutex.
    sessions: DashMap<u64, Arc<SessionState>>,
}

#[derive(Debug)]
struct SessionState {
    /// Earliest instant the next request may start; `None` before the first request.
    next_allowed: Mutex<Option<Instant>>,
    cumulative_delay_ms: AtomicU64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            next_allowed: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let new_total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(new_total)
    }
}

/// Held for the duration of one gated request.
///
/// Call [`finish`](Self::finish) once the request completes so the interval
/// counts from completion. Dropping the permit without finishing keeps the
/// start-time spacing only.
#[derive(Debug)]
#[must_use = "call finish() when the request completes"]
pub struct PolitenessPermit {
    state: Option<Arc<SessionState>>,
    interval: Duration,
}

impl PolitenessPermit {
    /// Marks the gated request as complete.
    pub async fn finish(self) {
        if let Some(state) = self.state {
            let mut next_allowed = state.next_allowed.lock().await;
            let after_completion = Instant::now() + self.interval;
            if next_allowed.is_none_or(|next| next < after_completion) {
                *next_allowed = Some(after_completion);
            }
        }
    }
}

impl PolitenessGate {
    /// Creates a gate spacing each session's requests by `interval`.
    #[must_use]
    #[instrument(skip_all, fields(interval_ms = interval.as_millis()))]
    pub fn new(interval: Duration) -> Self {
        debug!("creating politeness gate");
        Self {
            interval,
            disabled: false,
            sessions: DashMap::new(),
        }
    }

    /// Creates a gate that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            interval: Duration::ZERO,
            disabled: true,
            sessions: DashMap::new(),
        }
    }

    /// Returns whether the gate is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Configured spacing.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn state_for(&self, session_id: u64) -> Arc<SessionState> {
        self.sessions
            .entry(session_id)
            .or_insert_with(|| Arc::new(SessionState::new()))
            .clone()
    }

    /// Waits until `session_id` may issue its next request.
    ///
    /// The first request of a session proceeds immediately.
    #[instrument(skip(self))]
    pub async fn acquire(&self, session_id: u64) -> PolitenessPermit {
        if self.disabled {
            return PolitenessPermit {
                state: None,
                interval: Duration::ZERO,
            };
        }

        let state = self.state_for(session_id);

        // Held across the sleep so concurrent acquirers of one session queue up.
        let mut next_allowed = state.next_allowed.lock().await;

        if let Some(next) = *next_allowed {
            let now = Instant::now();
            if next > now {
                let delay = next - now;
                let cumulative = state.add_cumulative_delay(delay);
                debug!(
                    delay_ms = delay.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "applying politeness delay"
                );
                if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                    warn!(
                        session = session_id,
                        cumulative_delay_secs = cumulative.as_secs(),
                        "excessive politeness delay - consider fewer workers or a lower limit"
                    );
                }
                tokio::time::sleep_until(next).await;
            }
        } else {
            debug!("first request of session - no delay");
        }

        *next_allowed = Some(Instant::now() + self.interval);
        drop(next_allowed);

        PolitenessPermit {
            state: Some(state),
            interval: self.interval,
        }
    }

    /// Pushes the session's next request back by a server-mandated `delay`.
    #[instrument(skip(self))]
    pub async fn record_rate_limit(&self, session_id: u64, delay: Duration) {
        if self.disabled {
            return;
        }
        let state = self.state_for(session_id);
        let cumulative = state.add_cumulative_delay(delay);
        {
            let mut next_allowed = state.next_allowed.lock().await;
            let resume = Instant::now() + delay;
            if next_allowed.is_none_or(|next| next < resume) {
                *next_allowed = Some(resume);
            }
        }
        debug!(
            delay_ms = delay.as_millis(),
            cumulative_ms = cumulative.as_millis(),
            "recorded server rate limit"
        );
        if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
            warn!(
                session = session_id,
                cumulative_delay_secs = cumulative.as_secs(),
                "excessive server rate limiting - site may be under heavy load"
            );
        }
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports integer seconds (`Retry-After: 120`) and HTTP-dates
/// (`Retry-After: Wed, 21 Oct 2025 07:28:00 GMT`). Returns `None` for
/// unparseable values; caps excessive values at 1 hour; a past date means
/// no wait.
///
/// ```
/// use std::time::Duration;
/// use crawler_core::download::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);

        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }

        return Some(duration);
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        if let Ok(duration) = datetime.duration_since(std::time::SystemTime::now()) {
            if duration > MAX_RETRY_AFTER {
                warn!(
                    delay_secs = duration.as_secs(),
                    max_secs = MAX_RETRY_AFTER.as_secs(),
                    "Retry-After date exceeds maximum, capping at 1 hour"
                );
                return Some(MAX_RETRY_AFTER);
            }
            Some(duration)
        } else {
            debug!(header_value, "Retry-After date is in the past, returning zero");
            Some(Duration::ZERO)
        }
    } else {
        debug!(header_value, "unparseable Retry-After value");
        None
    }
}
