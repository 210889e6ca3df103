//! Ordered, first-success strategy execution.
//!
//! The executor never races strategies and never retries within one: a
//! failing strategy (a challenge included) is recorded and the next one is
//! tried immediately. Only when every supporting strategy has failed does the
//! task fail, carrying the full attempt log.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::{DiscoveryTask, Strategy, StrategyError};
use crate::cache::CacheSource;
use crate::fetch::{RawPage, Session};
use crate::model::ErrorKind;

/// One failed strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyFailure {
    /// Strategy name.
    pub strategy: String,
    /// Failure classification.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

/// Every supporting strategy failed for a task.
#[derive(Debug, Clone, Error)]
#[error("discovery exhausted for {task}: {}", summarize(.attempts))]
pub struct DiscoveryError {
    /// Cache key of the failed task.
    pub task: String,
    /// Always true: the chain ran to its end.
    pub exhausted: bool,
    /// Attempt log in execution order.
    pub attempts: Vec<StrategyFailure>,
}

impl DiscoveryError {
    /// Failure classification for reports.
    ///
    /// A page every strategy fetched but none could parse is a structural
    /// problem; anything else is plain exhaustion.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        if !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|a| a.kind == ErrorKind::ParseStructuralError)
        {
            ErrorKind::ParseStructuralError
        } else {
            ErrorKind::DiscoveryExhausted
        }
    }
}

fn summarize(attempts: &[StrategyFailure]) -> String {
    if attempts.is_empty() {
        return "no strategy supports this task".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{} -> {} ({})", a.strategy, a.kind, a.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Successful discovery result.
#[derive(Debug, Clone)]
pub struct DiscoveredPage<T> {
    /// Value produced from the accepted page.
    pub value: T,
    /// Name of the winning strategy.
    pub strategy: String,
    /// Cache provenance of the winning strategy.
    pub source: CacheSource,
    /// Failures recorded before the winning strategy.
    pub failures: Vec<StrategyFailure>,
}

/// Runs strategies in order until one succeeds.
#[derive(Debug, Clone)]
pub struct StrategyExecutor {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategyExecutor {
    /// Creates an executor over `strategies`, tried in the given order.
    #[must_use]
    pub fn new(strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// Configured strategies in order.
    #[must_use]
    pub fn strategies(&self) -> &[Arc<dyn Strategy>] {
        &self.strategies
    }

    /// Returns the first page any strategy obtains for `task`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when every supporting strategy failed.
    pub async fn discover(
        &self,
        task: &DiscoveryTask,
        session: &Session,
    ) -> Result<DiscoveredPage<RawPage>, DiscoveryError> {
        self.discover_with(task, session, Ok).await
    }

    /// Like [`discover`](Self::discover), but a page only wins once `accept`
    /// turns it into a value. A rejected page counts as that strategy's
    /// failure and the next strategy is tried.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when every supporting strategy failed.
    #[instrument(skip(self, session, accept), fields(task = %task))]
    pub async fn discover_with<T, F>(
        &self,
        task: &DiscoveryTask,
        session: &Session,
        mut accept: F,
    ) -> Result<DiscoveredPage<T>, DiscoveryError>
    where
        F: FnMut(RawPage) -> Result<T, StrategyError> + Send,
        T: Send,
    {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            if !strategy.supports(task) {
                debug!(strategy = strategy.name(), "strategy does not support task, skipping");
                continue;
            }

            let outcome = match strategy.attempt(task, session).await {
                Ok(page) => accept(page),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => {
                    info!(
                        strategy = strategy.name(),
                        failed_before = failures.len(),
                        "discovery succeeded"
                    );
                    return Ok(DiscoveredPage {
                        value,
                        strategy: strategy.name().to_string(),
                        source: strategy.source(),
                        failures,
                    });
                }
                Err(e) => {
                    let kind = e.kind();
                    warn!(strategy = strategy.name(), %kind, error = %e, "strategy failed, advancing");
                    failures.push(StrategyFailure {
                        strategy: strategy.name().to_string(),
                        kind,
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(DiscoveryError {
            task: task.cache_key(),
            exhausted: true,
            attempts: failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_error_kind_structural_when_all_unparseable() {
        let err = DiscoveryError {
            task: "journals".to_string(),
            exhausted: true,
            attempts: vec![StrategyFailure {
                strategy: "http".to_string(),
                kind: ErrorKind::ParseStructuralError,
                message: "no menu".to_string(),
            }],
        };
        assert_eq!(err.kind(), ErrorKind::ParseStructuralError);
    }

    #[test]
    fn test_discovery_error_kind_exhausted_for_mixed_failures() {
        let err = DiscoveryError {
            task: "journals".to_string(),
            exhausted: true,
            attempts: vec![
                StrategyFailure {
                    strategy: "http".to_string(),
                    kind: ErrorKind::ChallengeDetected,
                    message: "challenge".to_string(),
                },
                StrategyFailure {
                    strategy: "browser".to_string(),
                    kind: ErrorKind::ParseStructuralError,
                    message: "no menu".to_string(),
                },
            ],
        };
        assert_eq!(err.kind(), ErrorKind::DiscoveryExhausted);
        let text = err.to_string();
        assert!(text.contains("http -> ChallengeDetected"));
        assert!(text.contains("browser -> ParseStructuralError"));
    }

    #[test]
    fn test_discovery_error_without_attempts() {
        let err = DiscoveryError {
            task: "articles:cell:0".to_string(),
            exhausted: true,
            attempts: Vec::new(),
        };
        assert_eq!(err.kind(), ErrorKind::DiscoveryExhausted);
        assert!(err.to_string().contains("no strategy supports"));
    }
}
