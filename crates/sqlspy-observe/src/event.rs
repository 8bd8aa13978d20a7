//! SQL execution events.
//!
//! A [`SqlEvent`] is built once per captured execution call, handed to every
//! listener by reference and dropped afterwards. It borrows the statement text
//! and the delegate's error so the failing value can be returned to the caller
//! untouched once dispatch is over. Listeners that need to keep an event turn
//! it into an owned [`SqlEventRecord`].

use std::error::Error;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used when the statement text cannot be resolved.
pub const UNKNOWN_SQL: &str = "<unknown>";

/// Immutable description of one captured execution attempt.
#[derive(Clone, Copy)]
pub struct SqlEvent<'a> {
    sql: &'a str,
    elapsed: Duration,
    started_at: DateTime<Utc>,
    success: bool,
    error: Option<&'a (dyn Error + 'static)>,
    batch_size: usize,
}

impl<'a> SqlEvent<'a> {
    /// Start building an event for `sql`.
    ///
    /// `None` is replaced by [`UNKNOWN_SQL`].
    pub fn builder(sql: Option<&'a str>) -> SqlEventBuilder<'a> {
        SqlEventBuilder::new(sql)
    }

    /// Statement text; the bound template for prepared statements.
    pub fn sql(&self) -> &'a str {
        self.sql
    }

    /// Time spent inside the real call.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Elapsed time in whole milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    /// Wall-clock time the call started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether the real call returned normally.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// The failure returned by the real call, if any.
    pub fn error(&self) -> Option<&'a (dyn Error + 'static)> {
        self.error
    }

    /// Number of statements in the batch; 1 for non-batch execution.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Copy this event into an owned, serializable record.
    pub fn to_record(&self) -> SqlEventRecord {
        SqlEventRecord {
            sql: self.sql.to_string(),
            elapsed_ms: self.elapsed_ms(),
            started_at: self.started_at,
            success: self.success,
            error: self.error.map(|e| e.to_string()),
            batch_size: self.batch_size,
        }
    }
}

impl fmt::Debug for SqlEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlEvent")
            .field("sql", &self.sql)
            .field("elapsed", &self.elapsed)
            .field("started_at", &self.started_at)
            .field("success", &self.success)
            .field("error", &self.error.map(|e| e.to_string()))
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

/// Builder for [`SqlEvent`].
pub struct SqlEventBuilder<'a> {
    sql: &'a str,
    elapsed: Duration,
    started_at: DateTime<Utc>,
    success: bool,
    error: Option<&'a (dyn Error + 'static)>,
    batch_size: usize,
}

impl<'a> SqlEventBuilder<'a> {
    fn new(sql: Option<&'a str>) -> Self {
        Self {
            sql: sql.unwrap_or(UNKNOWN_SQL),
            elapsed: Duration::ZERO,
            started_at: Utc::now(),
            success: true,
            error: None,
            batch_size: 1,
        }
    }

    /// Set the elapsed time.
    pub fn elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Set the start timestamp.
    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Set the success flag.
    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Attach the call's failure.
    ///
    /// `Some` also marks the event as failed; `None` leaves the flag alone.
    pub fn error(mut self, error: Option<&'a (dyn Error + 'static)>) -> Self {
        if error.is_some() {
            self.success = false;
        }
        self.error = error;
        self
    }

    /// Set the batch size. Values below 1 are raised to 1.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Build the event.
    pub fn build(self) -> SqlEvent<'a> {
        SqlEvent {
            sql: self.sql,
            elapsed: self.elapsed,
            started_at: self.started_at,
            // an attached error always wins over a later success(true)
            success: self.success && self.error.is_none(),
            error: self.error,
            batch_size: self.batch_size,
        }
    }
}

/// Owned copy of a [`SqlEvent`], with the error rendered to its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlEventRecord {
    /// Statement text.
    pub sql: String,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    /// Whether the call succeeded.
    pub success: bool,
    /// Error message, when the call failed with an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Batch size.
    pub batch_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl Error for Boom {}

    #[test]
    fn test_builder_defaults() {
        let event = SqlEvent::builder(Some("SELECT 1")).build();

        assert_eq!(event.sql(), "SELECT 1");
        assert!(event.is_success());
        assert!(event.error().is_none());
        assert_eq!(event.batch_size(), 1);
        assert_eq!(event.elapsed_ms(), 0);
    }

    #[test]
    fn test_missing_sql_uses_placeholder() {
        let event = SqlEvent::builder(None).build();
        assert_eq!(event.sql(), UNKNOWN_SQL);
    }

    #[test]
    fn test_error_marks_failure() {
        let boom = Boom;
        let event = SqlEvent::builder(Some("DELETE FROM t"))
            .success(true)
            .error(Some(&boom))
            .build();

        assert!(!event.is_success());
        assert_eq!(event.error().map(|e| e.to_string()), Some("boom".to_string()));
    }

    #[test]
    fn test_error_wins_over_late_success() {
        let boom = Boom;
        let event = SqlEvent::builder(Some("x"))
            .error(Some(&boom))
            .success(true)
            .build();

        assert!(!event.is_success());
    }

    #[test]
    fn test_failure_without_error_is_allowed() {
        let event = SqlEvent::builder(Some("x")).success(false).error(None).build();

        assert!(!event.is_success());
        assert!(event.error().is_none());
    }

    #[test]
    fn test_batch_size_floor() {
        let event = SqlEvent::builder(None).batch_size(0).build();
        assert_eq!(event.batch_size(), 1);
    }

    #[test]
    fn test_to_record() {
        let boom = Boom;
        let event = SqlEvent::builder(Some("UPDATE t SET a = 1"))
            .elapsed(Duration::from_millis(42))
            .batch_size(3)
            .error(Some(&boom))
            .build();

        let record = event.to_record();
        assert_eq!(record.sql, "UPDATE t SET a = 1");
        assert_eq!(record.elapsed_ms, 42);
        assert_eq!(record.batch_size, 3);
        assert!(!record.success);
        assert_eq!(record.error.as_deref(), Some("boom"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sql"], "UPDATE t SET a = 1");
        assert_eq!(json["error"], "boom");
    }
}
