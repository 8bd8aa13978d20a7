//! Errors raised by the mock driver.

use thiserror::Error;

/// Failures of the mock driver.
///
/// Comparable so tests can check that an instrumented handle returned exactly
/// the failure the driver produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockError {
    /// The statement matched a failure rule of the script.
    #[error("Statement rejected: {message}")]
    Rejected {
        /// The SQL that matched.
        sql: String,
        /// The scripted message.
        message: String,
    },

    /// The handle was closed.
    #[error("Handle is closed")]
    Closed,

    /// A prepared-only call on a statement without a template.
    #[error("Statement has no SQL template")]
    NotPrepared,

    /// An output parameter was read without being registered.
    #[error("Output parameter {0} is not registered")]
    UnregisteredOutParameter(usize),

    /// Parameter indexes are 1-based.
    #[error("Invalid parameter index: {0}")]
    InvalidParameterIndex(usize),

    /// The data source refused the credentials.
    #[error("Access denied for user '{0}'")]
    AccessDenied(String),
}

/// Result type alias for mock driver calls.
pub type MockResult<T> = std::result::Result<T, MockError>;
