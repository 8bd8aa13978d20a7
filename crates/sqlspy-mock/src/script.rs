//! Scripted behaviour of the mock driver.

use std::collections::BTreeMap;
use std::time::Duration;

use sqlspy_core::SqlValue;

use crate::error::MockError;

/// Makes statements containing `pattern` fail with `message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRule {
    /// Substring matched against the SQL text.
    pub pattern: String,
    /// Message of the resulting [`MockError::Rejected`].
    pub message: String,
}

/// How the mock driver answers calls.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use sqlspy_mock::MockScript;
///
/// let script = MockScript::new()
///     .fail_on("DROP", "permission denied")
///     .with_latency(Duration::from_millis(5))
///     .with_update_count(3);
/// ```
#[derive(Debug, Clone)]
pub struct MockScript {
    failures: Vec<FailureRule>,
    latency: Duration,
    rows: Vec<Vec<SqlValue>>,
    update_count: u32,
    out_values: BTreeMap<usize, SqlValue>,
    accepted_users: Option<Vec<String>>,
}

impl MockScript {
    /// A script where every statement succeeds instantly.
    pub fn new() -> Self {
        Self {
            failures: Vec::new(),
            latency: Duration::ZERO,
            rows: Vec::new(),
            update_count: 1,
            out_values: BTreeMap::new(),
            accepted_users: None,
        }
    }

    /// Fail every statement whose SQL contains `pattern`.
    pub fn fail_on(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.push(FailureRule {
            pattern: pattern.into(),
            message: message.into(),
        });
        self
    }

    /// Sleep this long in every execution.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Rows returned by every query.
    pub fn with_rows(mut self, rows: Vec<Vec<SqlValue>>) -> Self {
        self.rows = rows;
        self
    }

    /// Rows reported by every update and every batch entry.
    pub fn with_update_count(mut self, count: u32) -> Self {
        self.update_count = count;
        self
    }

    /// Value of the output parameter `index` after a call.
    pub fn with_out_value(mut self, index: usize, value: impl Into<SqlValue>) -> Self {
        self.out_values.insert(index, value.into());
        self
    }

    /// Only let these users connect through a data source.
    pub fn with_accepted_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_users = Some(users.into_iter().map(Into::into).collect());
        self
    }

    /// The failure rules.
    pub fn failures(&self) -> &[FailureRule] {
        &self.failures
    }

    /// The execution latency.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// The canned query rows.
    pub fn rows(&self) -> &[Vec<SqlValue>] {
        &self.rows
    }

    /// The update count per statement.
    pub fn update_count(&self) -> u32 {
        self.update_count
    }

    /// The scripted output parameter value, `NULL` when unset.
    pub fn out_value(&self, index: usize) -> SqlValue {
        self.out_values.get(&index).cloned().unwrap_or_default()
    }

    /// The failure `sql` triggers, if any.
    pub fn failure_for(&self, sql: &str) -> Option<MockError> {
        self.failures
            .iter()
            .find(|rule| sql.contains(&rule.pattern))
            .map(|rule| MockError::Rejected {
                sql: sql.to_string(),
                message: rule.message.clone(),
            })
    }

    /// Check that `user` may connect.
    pub fn check_user(&self, user: &str) -> Result<(), MockError> {
        match &self.accepted_users {
            Some(users) if !users.iter().any(|u| u == user) => {
                Err(MockError::AccessDenied(user.to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl Default for MockScript {
    fn default() -> Self {
        Self::new()
    }
}
