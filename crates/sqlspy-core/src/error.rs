//! Error types for the interception engine.
//!
//! The interceptors never create errors of their own: whatever the wrapped
//! driver returns is handed back unchanged. What is left here concerns the
//! operation registry.

use thiserror::Error;

/// Errors from the operation registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name does not belong to any intercepted operation.
    #[error("Unknown operation: '{0}'")]
    UnknownOperation(String),
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
