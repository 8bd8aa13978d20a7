//! Mock connections.

use std::sync::Arc;
use std::time::Duration;

use sqlspy_core::Connection;

use crate::error::{MockError, MockResult};
use crate::journal::CallJournal;
use crate::script::MockScript;
use crate::statement::MockStatement;

/// A connection of the mock driver.
#[derive(Debug)]
pub struct MockConnection {
    script: Arc<MockScript>,
    journal: CallJournal,
    user: Option<String>,
    auto_commit: bool,
    read_only: bool,
    schema: Option<String>,
    closed: bool,
}

impl MockConnection {
    /// Open a connection following `script`.
    pub fn new(script: MockScript) -> Self {
        Self::with_journal(Arc::new(script), CallJournal::new())
    }

    /// Open a connection that records into an existing journal.
    pub fn with_journal(script: Arc<MockScript>, journal: CallJournal) -> Self {
        Self {
            script,
            journal,
            user: None,
            auto_commit: true,
            read_only: false,
            schema: None,
            closed: false,
        }
    }

    pub(crate) fn with_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    /// The calls that reached this connection and its statements.
    pub fn journal(&self) -> &CallJournal {
        &self.journal
    }

    /// The script the connection follows.
    pub fn script(&self) -> &MockScript {
        &self.script
    }

    /// User the connection was opened as.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    fn ensure_open(&self) -> MockResult<()> {
        if self.closed {
            return Err(MockError::Closed);
        }
        Ok(())
    }

    fn statement(
        &mut self,
        method: &'static str,
        template: Option<&str>,
    ) -> MockResult<MockStatement> {
        self.ensure_open()?;
        self.journal.record(method, template);
        Ok(MockStatement::new(
            Arc::clone(&self.script),
            self.journal.clone(),
            template.map(str::to_string),
        ))
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new(MockScript::default())
    }
}

impl Connection for MockConnection {
    type Error = MockError;
    type Stmt = MockStatement;
    type Prepared = MockStatement;
    type Callable = MockStatement;

    fn create_statement(&mut self) -> MockResult<MockStatement> {
        self.statement("create_statement", None)
    }

    fn prepare_statement(&mut self, sql: &str) -> MockResult<MockStatement> {
        self.statement("prepare_statement", Some(sql))
    }

    fn prepare_call(&mut self, sql: &str) -> MockResult<MockStatement> {
        self.statement("prepare_call", Some(sql))
    }

    fn native_sql(&self, sql: &str) -> MockResult<String> {
        self.ensure_open()?;
        self.journal.record("native_sql", Some(sql));
        Ok(sql.to_string())
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> MockResult<()> {
        self.ensure_open()?;
        self.journal.record("set_auto_commit", None);
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> MockResult<bool> {
        self.ensure_open()?;
        Ok(self.auto_commit)
    }

    fn commit(&mut self) -> MockResult<()> {
        self.ensure_open()?;
        self.journal.record("commit", None);
        Ok(())
    }

    fn rollback(&mut self) -> MockResult<()> {
        self.ensure_open()?;
        self.journal.record("rollback", None);
        Ok(())
    }

    fn set_read_only(&mut self, read_only: bool) -> MockResult<()> {
        self.ensure_open()?;
        self.journal.record("set_read_only", None);
        self.read_only = read_only;
        Ok(())
    }

    fn is_read_only(&self) -> MockResult<bool> {
        self.ensure_open()?;
        Ok(self.read_only)
    }

    fn set_schema(&mut self, schema: &str) -> MockResult<()> {
        self.ensure_open()?;
        self.journal.record("set_schema", Some(schema));
        self.schema = Some(schema.to_string());
        Ok(())
    }

    fn schema(&self) -> MockResult<Option<String>> {
        self.ensure_open()?;
        Ok(self.schema.clone())
    }

    fn is_valid(&self, _timeout: Duration) -> MockResult<bool> {
        Ok(!self.closed)
    }

    fn close(&mut self) -> MockResult<()> {
        self.journal.record("close", None);
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlspy_core::PreparedStatement;

    #[test]
    fn test_statements_share_journal() {
        let mut conn = MockConnection::default();
        let mut stmt = conn.prepare_statement("SELECT ?").unwrap();
        stmt.execute_query_prepared().unwrap();

        let methods: Vec<_> = conn.journal().calls().iter().map(|c| c.method).collect();
        assert_eq!(methods, vec!["prepare_statement", "execute_query"]);
    }

    #[test]
    fn test_transaction_state() {
        let mut conn = MockConnection::default();
        assert!(conn.auto_commit().unwrap());

        conn.set_auto_commit(false).unwrap();
        conn.commit().unwrap();
        conn.rollback().unwrap();

        assert!(!conn.auto_commit().unwrap());
        assert_eq!(conn.journal().count("commit"), 1);
    }

    #[test]
    fn test_closed_connection() {
        let mut conn = MockConnection::default();
        conn.close().unwrap();

        assert!(conn.is_closed());
        assert!(!conn.is_valid(Duration::from_secs(1)).unwrap());
        assert_eq!(conn.create_statement().unwrap_err(), MockError::Closed);
    }
}
