//! The closed set of intercepted operations.
//!
//! Every driver operation the interceptors treat specially is listed here,
//! keyed by its method name on the driver traits. Anything not listed is
//! forwarded untouched. Lookup is an exact, case-sensitive match.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// How an interceptor treats an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Creates a plain statement.
    CreateStatement,
    /// Creates a prepared statement bound to a SQL template.
    PrepareStatement,
    /// Creates a callable statement bound to a SQL template.
    PrepareCall,
    /// Queues a statement for batch execution.
    AddBatch,
    /// Executes SQL; timed and reported.
    Execute,
}

impl Category {
    /// Snake-case name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::CreateStatement => "create_statement",
            Category::PrepareStatement => "prepare_statement",
            Category::PrepareCall => "prepare_call",
            Category::AddBatch => "add_batch",
            Category::Execute => "execute",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An intercepted driver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// `Connection::create_statement`.
    CreateStatement,
    /// `Connection::prepare_statement`.
    PrepareStatement,
    /// `Connection::prepare_call`.
    PrepareCall,
    /// `Statement::add_batch` and `PreparedStatement::add_batch_prepared`.
    AddBatch,
    /// `Statement::execute` and `PreparedStatement::execute_prepared`.
    Execute,
    /// `Statement::execute_query` and its prepared overload.
    ExecuteQuery,
    /// `Statement::execute_update` and its prepared overload.
    ExecuteUpdate,
    /// `Statement::execute_large_update` and its prepared overload.
    ExecuteLargeUpdate,
    /// `Statement::execute_batch`.
    ExecuteBatch,
    /// `Statement::execute_large_batch`.
    ExecuteLargeBatch,
}

impl Operation {
    /// Every known operation.
    pub const ALL: [Operation; 10] = [
        Operation::CreateStatement,
        Operation::PrepareStatement,
        Operation::PrepareCall,
        Operation::AddBatch,
        Operation::Execute,
        Operation::ExecuteQuery,
        Operation::ExecuteUpdate,
        Operation::ExecuteLargeUpdate,
        Operation::ExecuteBatch,
        Operation::ExecuteLargeBatch,
    ];

    /// Method name of the operation on the driver traits.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateStatement => "create_statement",
            Operation::PrepareStatement => "prepare_statement",
            Operation::PrepareCall => "prepare_call",
            Operation::AddBatch => "add_batch",
            Operation::Execute => "execute",
            Operation::ExecuteQuery => "execute_query",
            Operation::ExecuteUpdate => "execute_update",
            Operation::ExecuteLargeUpdate => "execute_large_update",
            Operation::ExecuteBatch => "execute_batch",
            Operation::ExecuteLargeBatch => "execute_large_batch",
        }
    }

    /// Look an operation up by exact method name.
    pub fn from_name(name: &str) -> Option<Operation> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// The category the interceptors dispatch on.
    pub fn category(&self) -> Category {
        match self {
            Operation::CreateStatement => Category::CreateStatement,
            Operation::PrepareStatement => Category::PrepareStatement,
            Operation::PrepareCall => Category::PrepareCall,
            Operation::AddBatch => Category::AddBatch,
            Operation::Execute
            | Operation::ExecuteQuery
            | Operation::ExecuteUpdate
            | Operation::ExecuteLargeUpdate
            | Operation::ExecuteBatch
            | Operation::ExecuteLargeBatch => Category::Execute,
        }
    }

    /// Whether the operation executes SQL.
    pub fn is_execute(&self) -> bool {
        self.category() == Category::Execute
    }

    /// Whether the operation runs the queued batch.
    pub fn is_batch_execute(&self) -> bool {
        matches!(self, Operation::ExecuteBatch | Operation::ExecuteLargeBatch)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| RegistryError::UnknownOperation(s.to_string()))
    }
}

/// Category of the operation called `name`, or `None` for passthrough.
pub fn category_of(name: &str) -> Option<Category> {
    Operation::from_name(name).map(|op| op.category())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
    }

    #[test]
    fn test_category_of() {
        assert_eq!(category_of("create_statement"), Some(Category::CreateStatement));
        assert_eq!(category_of("prepare_statement"), Some(Category::PrepareStatement));
        assert_eq!(category_of("prepare_call"), Some(Category::PrepareCall));
        assert_eq!(category_of("add_batch"), Some(Category::AddBatch));
        assert_eq!(category_of("execute_large_batch"), Some(Category::Execute));
        assert_eq!(category_of("commit"), None);
    }

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(category_of("Execute"), None);
        assert_eq!(category_of("EXECUTE_QUERY"), None);
        assert_eq!(category_of("execute_"), None);
        assert_eq!(category_of("execute_query "), None);
        assert_eq!(category_of(""), None);
    }

    #[test]
    fn test_batch_variants() {
        let batch: Vec<_> = Operation::ALL
            .into_iter()
            .filter(Operation::is_batch_execute)
            .collect();
        assert_eq!(batch, vec![Operation::ExecuteBatch, Operation::ExecuteLargeBatch]);
        assert!(batch.iter().all(Operation::is_execute));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("execute_update".parse::<Operation>().unwrap(), Operation::ExecuteUpdate);
        let err = "close".parse::<Operation>().unwrap_err();
        assert!(matches!(err, RegistryError::UnknownOperation(name) if name == "close"));
    }
}
