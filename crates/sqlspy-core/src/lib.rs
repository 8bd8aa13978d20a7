//! SqlSpy Core - Statement Interception Engine
//!
//! This crate decorates database client handles so every executed statement
//! is reported to listeners, without changing what the calls return.
//! It includes:
//!
//! - [`driver`]: The capability traits a database binding implements
//! - [`SpyConnection`]: Connection decorator that instruments created statements
//! - [`SpyStatement`]: Statement decorator that times and reports executions
//! - [`Operation`]: The closed set of intercepted operations
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sqlspy_core::prelude::*;
//! use sqlspy_observe::{SharedListener, TracingListener};
//!
//! let mut conn = sqlspy_core::wrap(real_conn, [Arc::new(TracingListener::new()) as SharedListener]);
//!
//! let mut stmt = conn.create_statement()?;
//! stmt.execute("SELECT 1")?; // reported once, with its duration and outcome
//! ```
//!
//! # Behaviour
//!
//! 1. **Transparent**: results and errors of the wrapped driver come back unchanged
//! 2. **Isolated**: a failing or panicking listener never reaches the caller
//! 3. **Synchronous**: listeners run on the calling thread, in registration order
//!
//! The SQL text is never parsed or rewritten.

pub mod connection;
pub mod driver;
pub mod error;
pub mod registry;
pub mod statement;
pub mod types;

// Re-export main types at crate root
pub use connection::{ConnectionId, SpyConnection};
pub use driver::{
    CallableStatement, Connection, DataSource, DataSourceError, Driver, DriverError,
    PreparedStatement, Properties, Statement,
};
pub use error::{RegistryError, RegistryResult};
pub use registry::{Category, Operation, category_of};
pub use statement::{SpyStatement, StatementKind};
pub use types::{SqlType, SqlValue};

use sqlspy_observe::{EventDispatcher, SharedListener};

/// Instrument `conn`, reporting every executed statement to `listeners`.
///
/// The listener list is captured now; the returned connection and all of its
/// statements deliver to exactly these listeners, in this order.
pub fn wrap<C: Connection>(
    conn: C,
    listeners: impl IntoIterator<Item = SharedListener>,
) -> SpyConnection<C> {
    SpyConnection::new(conn, EventDispatcher::new(listeners))
}

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```ignore
/// use sqlspy_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::connection::SpyConnection;
    pub use crate::driver::{
        CallableStatement, Connection, DataSource, Driver, PreparedStatement, Statement,
    };
    pub use crate::registry::Operation;
    pub use crate::statement::{SpyStatement, StatementKind};
    pub use crate::types::{SqlType, SqlValue};
}
