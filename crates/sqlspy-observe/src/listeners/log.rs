//! Structured-log listener.

use std::time::Duration;

use crate::dispatch::{ListenerResult, SqlListener};
use crate::event::SqlEvent;

/// Writes every event to `tracing` under the `sqlspy` target.
///
/// Successful statements are logged at `info`, failed ones at `warn` together
/// with the error message. With a slow-query threshold, successes slower than
/// the threshold are logged at `warn` as well.
#[derive(Debug, Clone, Default)]
pub struct TracingListener {
    slow_threshold: Option<Duration>,
}

impl TracingListener {
    /// Create a listener without a slow-query threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log successes that took at least `threshold` at `warn`.
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    /// The configured slow-query threshold.
    pub fn slow_threshold(&self) -> Option<Duration> {
        self.slow_threshold
    }

    fn is_slow(&self, event: &SqlEvent<'_>) -> bool {
        self.slow_threshold
            .is_some_and(|threshold| event.elapsed() >= threshold)
    }
}

impl SqlListener for TracingListener {
    fn on_event(&self, event: &SqlEvent<'_>) -> ListenerResult {
        if !event.is_success() {
            let error = event
                .error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            tracing::warn!(
                target: "sqlspy",
                elapsed_ms = event.elapsed_ms(),
                batch_size = event.batch_size(),
                sql = event.sql(),
                error = %error,
                "Statement failed"
            );
        } else if self.is_slow(event) {
            tracing::warn!(
                target: "sqlspy",
                elapsed_ms = event.elapsed_ms(),
                batch_size = event.batch_size(),
                sql = event.sql(),
                "Slow statement"
            );
        } else {
            tracing::info!(
                target: "sqlspy",
                elapsed_ms = event.elapsed_ms(),
                batch_size = event.batch_size(),
                sql = event.sql(),
                "Statement executed"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_threshold() {
        let listener = TracingListener::new().with_slow_threshold(Duration::from_millis(100));

        let fast = SqlEvent::builder(Some("SELECT 1"))
            .elapsed(Duration::from_millis(5))
            .build();
        let slow = SqlEvent::builder(Some("SELECT pg_sleep(1)"))
            .elapsed(Duration::from_millis(150))
            .build();

        assert!(!listener.is_slow(&fast));
        assert!(listener.is_slow(&slow));
        assert!(listener.on_event(&slow).is_ok());
    }

    #[test]
    fn test_never_slow_without_threshold() {
        let listener = TracingListener::new();
        let event = SqlEvent::builder(None)
            .elapsed(Duration::from_secs(60))
            .build();

        assert!(listener.slow_threshold().is_none());
        assert!(!listener.is_slow(&event));
    }

    #[test]
    fn test_failure_without_error_is_logged() {
        let listener = TracingListener::new();
        let event = SqlEvent::builder(Some("x")).success(false).build();
        assert!(listener.on_event(&event).is_ok());
    }
}
