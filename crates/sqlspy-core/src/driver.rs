//! Capability traits of a database client.
//!
//! These traits describe the handles SqlSpy decorates. A driver binding
//! implements them for its own connection and statement types; the
//! interceptors implement them again on top, so instrumented handles can be
//! used anywhere the real ones could.
//!
//! Statement capabilities nest: every [`CallableStatement`] is a
//! [`PreparedStatement`], and every prepared statement is a [`Statement`].
//! Prepared statements carry their SQL from creation, so their execution
//! methods take no text (`execute_prepared`, `execute_query_prepared`, ...).

use std::collections::BTreeMap;
use std::error::Error;
use std::time::Duration;

use crate::types::{SqlType, SqlValue};

/// Connection properties handed to a [`Driver`].
pub type Properties = BTreeMap<String, String>;

/// A statement that executes SQL text given per call.
pub trait Statement {
    /// Failure type of the driver.
    type Error: Error + 'static;
    /// Rows returned by queries.
    type ResultSet;

    /// Execute any statement; `true` when it produced a result set.
    fn execute(&mut self, sql: &str) -> Result<bool, Self::Error>;

    /// Execute a query.
    fn execute_query(&mut self, sql: &str) -> Result<Self::ResultSet, Self::Error>;

    /// Execute an update and return the affected row count.
    fn execute_update(&mut self, sql: &str) -> Result<u32, Self::Error>;

    /// Execute an update whose row count may not fit in 32 bits.
    fn execute_large_update(&mut self, sql: &str) -> Result<u64, Self::Error>;

    /// Queue `sql` for the next batch execution.
    fn add_batch(&mut self, sql: &str) -> Result<(), Self::Error>;

    /// Drop all queued batch entries.
    fn clear_batch(&mut self) -> Result<(), Self::Error>;

    /// Execute the queued batch, one update count per entry.
    fn execute_batch(&mut self) -> Result<Vec<u32>, Self::Error>;

    /// Execute the queued batch with 64-bit update counts.
    fn execute_large_batch(&mut self) -> Result<Vec<u64>, Self::Error>;

    /// Update count of the last execution, if it was an update.
    fn update_count(&self) -> Result<Option<u64>, Self::Error>;

    /// Limit the rows a query may return; 0 means no limit.
    fn set_max_rows(&mut self, max_rows: usize) -> Result<(), Self::Error>;

    /// Current row limit.
    fn max_rows(&self) -> Result<usize, Self::Error>;

    /// Set the execution timeout; `None` waits forever.
    fn set_query_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Self::Error>;

    /// Current execution timeout.
    fn query_timeout(&self) -> Result<Option<Duration>, Self::Error>;

    /// Ask the server to abort the running execution.
    fn cancel(&mut self) -> Result<(), Self::Error>;

    /// Release the statement.
    fn close(&mut self) -> Result<(), Self::Error>;

    /// Whether [`close`](Self::close) was called.
    fn is_closed(&self) -> bool;
}

/// A statement compiled from a SQL template with positional parameters.
pub trait PreparedStatement: Statement {
    /// Bind the 1-based parameter `index`.
    fn set_parameter(&mut self, index: usize, value: SqlValue) -> Result<(), Self::Error>;

    /// Unbind all parameters.
    fn clear_parameters(&mut self) -> Result<(), Self::Error>;

    /// Execute the template with the bound parameters.
    fn execute_prepared(&mut self) -> Result<bool, Self::Error>;

    /// Run the template as a query.
    fn execute_query_prepared(&mut self) -> Result<Self::ResultSet, Self::Error>;

    /// Run the template as an update.
    fn execute_update_prepared(&mut self) -> Result<u32, Self::Error>;

    /// Run the template as an update with a 64-bit count.
    fn execute_large_update_prepared(&mut self) -> Result<u64, Self::Error>;

    /// Queue the current parameter set for batch execution.
    fn add_batch_prepared(&mut self) -> Result<(), Self::Error>;
}

/// A prepared statement that calls a stored procedure.
pub trait CallableStatement: PreparedStatement {
    /// Declare the 1-based parameter `index` as an output of `sql_type`.
    fn register_out_parameter(&mut self, index: usize, sql_type: SqlType)
    -> Result<(), Self::Error>;

    /// Read an output parameter after execution.
    fn out_parameter(&self, index: usize) -> Result<SqlValue, Self::Error>;
}

/// An open session with a database.
pub trait Connection {
    /// Failure type of the driver.
    type Error: Error + 'static;
    /// Handle returned by [`create_statement`](Self::create_statement).
    type Stmt: Statement<Error = Self::Error>;
    /// Handle returned by [`prepare_statement`](Self::prepare_statement).
    type Prepared: PreparedStatement<Error = Self::Error>;
    /// Handle returned by [`prepare_call`](Self::prepare_call).
    type Callable: CallableStatement<Error = Self::Error>;

    /// Create a statement for ad-hoc SQL.
    fn create_statement(&mut self) -> Result<Self::Stmt, Self::Error>;

    /// Compile `sql` into a prepared statement.
    fn prepare_statement(&mut self, sql: &str) -> Result<Self::Prepared, Self::Error>;

    /// Compile a stored procedure call.
    fn prepare_call(&mut self, sql: &str) -> Result<Self::Callable, Self::Error>;

    /// Translate `sql` into the database's native grammar.
    fn native_sql(&self, sql: &str) -> Result<String, Self::Error>;

    /// Enable or disable auto-commit.
    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), Self::Error>;

    /// Whether auto-commit is on.
    fn auto_commit(&self) -> Result<bool, Self::Error>;

    /// Commit the current transaction.
    fn commit(&mut self) -> Result<(), Self::Error>;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> Result<(), Self::Error>;

    /// Hint that the connection will only read.
    fn set_read_only(&mut self, read_only: bool) -> Result<(), Self::Error>;

    /// Whether the connection is read-only.
    fn is_read_only(&self) -> Result<bool, Self::Error>;

    /// Switch the default schema.
    fn set_schema(&mut self, schema: &str) -> Result<(), Self::Error>;

    /// Current default schema.
    fn schema(&self) -> Result<Option<String>, Self::Error>;

    /// Check that the connection is still usable within `timeout`.
    fn is_valid(&self, timeout: Duration) -> Result<bool, Self::Error>;

    /// Close the connection.
    fn close(&mut self) -> Result<(), Self::Error>;

    /// Whether [`close`](Self::close) was called.
    fn is_closed(&self) -> bool;
}

/// Borrowed connections are connections too, so a handle can be instrumented
/// while its owner keeps it.
impl<C: Connection + ?Sized> Connection for &mut C {
    type Error = C::Error;
    type Stmt = C::Stmt;
    type Prepared = C::Prepared;
    type Callable = C::Callable;

    fn create_statement(&mut self) -> Result<Self::Stmt, Self::Error> {
        (**self).create_statement()
    }

    fn prepare_statement(&mut self, sql: &str) -> Result<Self::Prepared, Self::Error> {
        (**self).prepare_statement(sql)
    }

    fn prepare_call(&mut self, sql: &str) -> Result<Self::Callable, Self::Error> {
        (**self).prepare_call(sql)
    }

    fn native_sql(&self, sql: &str) -> Result<String, Self::Error> {
        (**self).native_sql(sql)
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), Self::Error> {
        (**self).set_auto_commit(auto_commit)
    }

    fn auto_commit(&self) -> Result<bool, Self::Error> {
        (**self).auto_commit()
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), Self::Error> {
        (**self).rollback()
    }

    fn set_read_only(&mut self, read_only: bool) -> Result<(), Self::Error> {
        (**self).set_read_only(read_only)
    }

    fn is_read_only(&self) -> Result<bool, Self::Error> {
        (**self).is_read_only()
    }

    fn set_schema(&mut self, schema: &str) -> Result<(), Self::Error> {
        (**self).set_schema(schema)
    }

    fn schema(&self) -> Result<Option<String>, Self::Error> {
        (**self).schema()
    }

    fn is_valid(&self, timeout: Duration) -> Result<bool, Self::Error> {
        (**self).is_valid(timeout)
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// Error type of the connections handed out by a [`DataSource`].
pub type DataSourceError<D> = <<D as DataSource>::Connection as Connection>::Error;

/// A factory of connections, typically backed by a pool.
pub trait DataSource {
    /// Connection type handed out.
    type Connection: Connection;

    /// Obtain a connection with the source's default credentials.
    fn connection(&self) -> Result<Self::Connection, DataSourceError<Self>>;

    /// Obtain a connection as `user`.
    fn connection_with_credentials(
        &self,
        user: &str,
        password: &str,
    ) -> Result<Self::Connection, DataSourceError<Self>>;
}

/// Error type of the connections opened by a [`Driver`].
pub type DriverError<D> = <<D as Driver>::Connection as Connection>::Error;

/// Opens connections from URLs.
pub trait Driver {
    /// Connection type opened.
    type Connection: Connection;

    /// Whether this driver handles `url`.
    fn accepts_url(&self, url: &str) -> bool;

    /// Open a connection to `url`.
    ///
    /// Returns `Ok(None)` when the URL belongs to another driver.
    fn connect(
        &self,
        url: &str,
        properties: &Properties,
    ) -> Result<Option<Self::Connection>, DriverError<Self>>;
}
