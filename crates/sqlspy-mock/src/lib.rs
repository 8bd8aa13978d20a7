//! SqlSpy Mock - Scripted In-Memory Driver
//!
//! A database driver that needs no database. Its behaviour comes from a
//! [`MockScript`] (failures by SQL substring, latency, canned rows) and every
//! call it receives lands in a [`CallJournal`], so tests can check both what
//! an instrumented handle reported and what actually reached the driver.
//!
//! # Example
//!
//! ```ignore
//! use sqlspy_core::prelude::*;
//! use sqlspy_mock::{MockConnection, MockScript};
//!
//! let mut conn = MockConnection::new(MockScript::new().fail_on("DROP", "denied"));
//! let mut stmt = conn.create_statement()?;
//!
//! assert!(stmt.execute("SELECT 1")?);
//! assert!(stmt.execute("DROP TABLE t").is_err());
//! assert_eq!(conn.journal().count("execute"), 2);
//! ```

pub mod connection;
pub mod driver;
pub mod error;
pub mod journal;
pub mod script;
pub mod statement;

pub use connection::MockConnection;
pub use driver::{MOCK_URL_PREFIX, MockDataSource, MockDriver};
pub use error::{MockError, MockResult};
pub use journal::{Call, CallJournal};
pub use script::{FailureRule, MockScript};
pub use statement::{MockResultSet, MockStatement};
