//! The connection interceptor.
//!
//! [`SpyConnection`] wraps a real connection. Statement creation is
//! intercepted so every statement handed out is itself instrumented;
//! transaction control, metadata and lifecycle calls are forwarded as-is.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlspy_observe::EventDispatcher;
use tracing::trace;
use uuid::Uuid;

use crate::driver::Connection;
use crate::statement::{SpyStatement, StatementKind};

/// Identifies a wrapped connection in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a new random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0.as_simple())
    }
}

/// An instrumented connection.
///
/// Every statement it creates reports to the listeners captured when the
/// connection was wrapped.
pub struct SpyConnection<C> {
    inner: C,
    dispatcher: EventDispatcher,
    id: ConnectionId,
}

impl<C: Connection> SpyConnection<C> {
    /// Wrap `inner`, reporting to `dispatcher`.
    pub fn new(inner: C, dispatcher: EventDispatcher) -> Self {
        let id = ConnectionId::new();
        trace!(
            connection_id = %id,
            listeners = dispatcher.listener_count(),
            "Connection wrapped"
        );
        Self {
            inner,
            dispatcher,
            id,
        }
    }

    fn wrap_statement<S>(
        &self,
        statement: S,
        kind: StatementKind,
        sql: Option<&str>,
    ) -> SpyStatement<S> {
        SpyStatement::new(
            statement,
            kind,
            sql.map(str::to_string),
            self.dispatcher.clone(),
            self.id,
        )
    }
}

impl<C> SpyConnection<C> {
    /// Unwrap the real connection.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Borrow the real connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Mutably borrow the real connection.
    ///
    /// Statements created through it are not instrumented.
    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    /// Identifier used in this connection's log lines.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Listeners every statement of this connection reports to.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }
}

impl<C: Connection> Connection for SpyConnection<C> {
    type Error = C::Error;
    type Stmt = SpyStatement<C::Stmt>;
    type Prepared = SpyStatement<C::Prepared>;
    type Callable = SpyStatement<C::Callable>;

    fn create_statement(&mut self) -> Result<Self::Stmt, Self::Error> {
        let statement = self.inner.create_statement()?;
        Ok(self.wrap_statement(statement, StatementKind::Plain, None))
    }

    fn prepare_statement(&mut self, sql: &str) -> Result<Self::Prepared, Self::Error> {
        let statement = self.inner.prepare_statement(sql)?;
        Ok(self.wrap_statement(statement, StatementKind::Prepared, Some(sql)))
    }

    fn prepare_call(&mut self, sql: &str) -> Result<Self::Callable, Self::Error> {
        let statement = self.inner.prepare_call(sql)?;
        Ok(self.wrap_statement(statement, StatementKind::Callable, Some(sql)))
    }

    fn native_sql(&self, sql: &str) -> Result<String, Self::Error> {
        self.inner.native_sql(sql)
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), Self::Error> {
        self.inner.set_auto_commit(auto_commit)
    }

    fn auto_commit(&self) -> Result<bool, Self::Error> {
        self.inner.auto_commit()
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), Self::Error> {
        self.inner.rollback()
    }

    fn set_read_only(&mut self, read_only: bool) -> Result<(), Self::Error> {
        self.inner.set_read_only(read_only)
    }

    fn is_read_only(&self) -> Result<bool, Self::Error> {
        self.inner.is_read_only()
    }

    fn set_schema(&mut self, schema: &str) -> Result<(), Self::Error> {
        self.inner.set_schema(schema)
    }

    fn schema(&self) -> Result<Option<String>, Self::Error> {
        self.inner.schema()
    }

    fn is_valid(&self, timeout: Duration) -> Result<bool, Self::Error> {
        self.inner.is_valid(timeout)
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<C: fmt::Debug> fmt::Debug for SpyConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpyConnection")
            .field("id", &self.id)
            .field("inner", &self.inner)
            .field("listeners", &self.dispatcher.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("conn_"));
    }
}
