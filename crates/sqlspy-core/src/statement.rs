//! The statement interceptor.
//!
//! [`SpyStatement`] wraps a real statement handle. Execution operations are
//! timed and reported to the listeners; batch queueing is counted so the
//! following batch execution can report its size. Everything else is
//! forwarded untouched.

use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlspy_observe::{EventDispatcher, SqlEvent};
use tracing::trace;

use crate::connection::ConnectionId;
use crate::driver::{CallableStatement, PreparedStatement, Statement};
use crate::registry::Operation;
use crate::types::{SqlType, SqlValue};

/// Which creation operation produced a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// From `create_statement`; SQL is given per execution.
    Plain,
    /// From `prepare_statement`; bound to a template.
    Prepared,
    /// From `prepare_call`; bound to a template.
    Callable,
}

impl StatementKind {
    /// Get the kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Plain => "plain",
            StatementKind::Prepared => "prepared",
            StatementKind::Callable => "callable",
        }
    }

    /// Whether statements of this kind carry a SQL template.
    pub fn is_bound(&self) -> bool {
        !matches!(self, StatementKind::Plain)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An instrumented statement.
///
/// Implements each statement capability the wrapped handle implements, so a
/// callable handle stays callable after wrapping.
pub struct SpyStatement<S> {
    inner: S,
    kind: StatementKind,
    bound_sql: Option<String>,
    dispatcher: EventDispatcher,
    batch_count: usize,
    connection_id: ConnectionId,
}

impl<S> SpyStatement<S> {
    pub(crate) fn new(
        inner: S,
        kind: StatementKind,
        bound_sql: Option<String>,
        dispatcher: EventDispatcher,
        connection_id: ConnectionId,
    ) -> Self {
        debug_assert_eq!(kind.is_bound(), bound_sql.is_some());
        trace!(
            connection_id = %connection_id,
            kind = %kind,
            bound = kind.is_bound(),
            sql = bound_sql.as_deref(),
            "Statement wrapped"
        );
        Self {
            inner,
            kind,
            bound_sql,
            dispatcher,
            batch_count: 0,
            connection_id,
        }
    }

    /// Unwrap the real statement.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Borrow the real statement.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the real statement.
    ///
    /// Calls made through it are not observed.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// How the statement was created.
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// The template this statement was prepared from.
    pub fn bound_sql(&self) -> Option<&str> {
        self.bound_sql.as_deref()
    }

    /// Entries queued since the last batch execution.
    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    /// Connection the statement was created on.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

impl<S: Statement> SpyStatement<S> {
    fn capture<T>(
        &mut self,
        operation: Operation,
        sql: Option<&str>,
        call: impl FnOnce(&mut S) -> Result<T, S::Error>,
    ) -> Result<T, S::Error> {
        let sql = self.bound_sql.as_deref().or(sql);
        let batch_size = if operation.is_batch_execute() {
            self.batch_count.max(1)
        } else {
            1
        };

        let started_at = Utc::now();
        let start = Instant::now();
        let result = call(&mut self.inner);
        let elapsed = start.elapsed();

        let event = SqlEvent::builder(sql)
            .started_at(started_at)
            .elapsed(elapsed)
            .batch_size(batch_size)
            .error(result.as_ref().err().map(|e| e as &(dyn Error + 'static)))
            .build();

        trace!(
            connection_id = %self.connection_id,
            operation = %operation,
            elapsed_ms = event.elapsed_ms(),
            success = event.is_success(),
            "Statement captured"
        );
        self.dispatcher.dispatch(&event);

        if operation.is_batch_execute() {
            self.batch_count = 0;
        }
        result
    }
}

impl<S: Statement> Statement for SpyStatement<S> {
    type Error = S::Error;
    type ResultSet = S::ResultSet;

    fn execute(&mut self, sql: &str) -> Result<bool, Self::Error> {
        self.capture(Operation::Execute, Some(sql), |s| s.execute(sql))
    }

    fn execute_query(&mut self, sql: &str) -> Result<Self::ResultSet, Self::Error> {
        self.capture(Operation::ExecuteQuery, Some(sql), |s| s.execute_query(sql))
    }

    fn execute_update(&mut self, sql: &str) -> Result<u32, Self::Error> {
        self.capture(Operation::ExecuteUpdate, Some(sql), |s| s.execute_update(sql))
    }

    fn execute_large_update(&mut self, sql: &str) -> Result<u64, Self::Error> {
        self.capture(Operation::ExecuteLargeUpdate, Some(sql), |s| {
            s.execute_large_update(sql)
        })
    }

    fn add_batch(&mut self, sql: &str) -> Result<(), Self::Error> {
        self.batch_count += 1;
        self.inner.add_batch(sql)
    }

    fn clear_batch(&mut self) -> Result<(), Self::Error> {
        self.inner.clear_batch()
    }

    fn execute_batch(&mut self) -> Result<Vec<u32>, Self::Error> {
        self.capture(Operation::ExecuteBatch, None, |s| s.execute_batch())
    }

    fn execute_large_batch(&mut self) -> Result<Vec<u64>, Self::Error> {
        self.capture(Operation::ExecuteLargeBatch, None, |s| s.execute_large_batch())
    }

    fn update_count(&self) -> Result<Option<u64>, Self::Error> {
        self.inner.update_count()
    }

    fn set_max_rows(&mut self, max_rows: usize) -> Result<(), Self::Error> {
        self.inner.set_max_rows(max_rows)
    }

    fn max_rows(&self) -> Result<usize, Self::Error> {
        self.inner.max_rows()
    }

    fn set_query_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Self::Error> {
        self.inner.set_query_timeout(timeout)
    }

    fn query_timeout(&self) -> Result<Option<Duration>, Self::Error> {
        self.inner.query_timeout()
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        self.inner.cancel()
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<S: PreparedStatement> PreparedStatement for SpyStatement<S> {
    fn set_parameter(&mut self, index: usize, value: SqlValue) -> Result<(), Self::Error> {
        self.inner.set_parameter(index, value)
    }

    fn clear_parameters(&mut self) -> Result<(), Self::Error> {
        self.inner.clear_parameters()
    }

    fn execute_prepared(&mut self) -> Result<bool, Self::Error> {
        self.capture(Operation::Execute, None, |s| s.execute_prepared())
    }

    fn execute_query_prepared(&mut self) -> Result<Self::ResultSet, Self::Error> {
        self.capture(Operation::ExecuteQuery, None, |s| s.execute_query_prepared())
    }

    fn execute_update_prepared(&mut self) -> Result<u32, Self::Error> {
        self.capture(Operation::ExecuteUpdate, None, |s| s.execute_update_prepared())
    }

    fn execute_large_update_prepared(&mut self) -> Result<u64, Self::Error> {
        self.capture(Operation::ExecuteLargeUpdate, None, |s| {
            s.execute_large_update_prepared()
        })
    }

    fn add_batch_prepared(&mut self) -> Result<(), Self::Error> {
        self.batch_count += 1;
        self.inner.add_batch_prepared()
    }
}

impl<S: CallableStatement> CallableStatement for SpyStatement<S> {
    fn register_out_parameter(
        &mut self,
        index: usize,
        sql_type: SqlType,
    ) -> Result<(), Self::Error> {
        self.inner.register_out_parameter(index, sql_type)
    }

    fn out_parameter(&self, index: usize) -> Result<SqlValue, Self::Error> {
        self.inner.out_parameter(index)
    }
}

impl<S: fmt::Debug> fmt::Debug for SpyStatement<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpyStatement")
            .field("inner", &self.inner)
            .field("kind", &self.kind)
            .field("bound_sql", &self.bound_sql)
            .field("batch_count", &self.batch_count)
            .field("listeners", &self.dispatcher.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_binding() {
        assert!(!StatementKind::Plain.is_bound());
        assert!(StatementKind::Prepared.is_bound());
        assert!(StatementKind::Callable.is_bound());
        assert_eq!(StatementKind::Callable.to_string(), "callable");
    }
}
