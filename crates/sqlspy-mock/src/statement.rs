//! Mock statements and result sets.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use sqlspy_core::{CallableStatement, PreparedStatement, SqlType, SqlValue, Statement};
use tracing::debug;

use crate::error::{MockError, MockResult};
use crate::journal::CallJournal;
use crate::script::MockScript;

/// Rows returned by a mock query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MockResultSet {
    rows: Vec<Vec<SqlValue>>,
}

impl MockResultSet {
    /// The rows.
    pub fn rows(&self) -> &[Vec<SqlValue>] {
        &self.rows
    }

    /// Take the rows.
    pub fn into_rows(self) -> Vec<Vec<SqlValue>> {
        self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the query returned nothing.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A statement of the mock driver.
///
/// Implements all three statement capabilities; whether it has a template
/// depends on how it was created.
#[derive(Debug)]
pub struct MockStatement {
    script: Arc<MockScript>,
    journal: CallJournal,
    template: Option<String>,
    parameters: BTreeMap<usize, SqlValue>,
    out_parameters: BTreeMap<usize, SqlType>,
    batch: Vec<String>,
    max_rows: usize,
    timeout: Option<Duration>,
    update_count: Option<u64>,
    executed: bool,
    closed: bool,
}

impl MockStatement {
    pub(crate) fn new(
        script: Arc<MockScript>,
        journal: CallJournal,
        template: Option<String>,
    ) -> Self {
        Self {
            script,
            journal,
            template,
            parameters: BTreeMap::new(),
            out_parameters: BTreeMap::new(),
            batch: Vec::new(),
            max_rows: 0,
            timeout: None,
            update_count: None,
            executed: false,
            closed: false,
        }
    }

    /// The template the statement was prepared from.
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Currently bound parameters.
    pub fn parameters(&self) -> &BTreeMap<usize, SqlValue> {
        &self.parameters
    }

    /// Entries waiting for batch execution.
    pub fn pending_batch(&self) -> &[String] {
        &self.batch
    }

    fn ensure_open(&self) -> MockResult<()> {
        if self.closed {
            return Err(MockError::Closed);
        }
        Ok(())
    }

    fn bound_template(&self) -> MockResult<String> {
        self.template.clone().ok_or(MockError::NotPrepared)
    }

    fn run(&mut self, method: &'static str, sql: &str) -> MockResult<()> {
        self.ensure_open()?;
        self.journal.record(method, Some(sql));

        if !self.script.latency().is_zero() {
            std::thread::sleep(self.script.latency());
        }
        self.executed = true;

        if let Some(err) = self.script.failure_for(sql) {
            debug!(method, sql, error = %err, "Mock failure injected");
            self.update_count = None;
            return Err(err);
        }
        Ok(())
    }

    fn query(&mut self, method: &'static str, sql: &str) -> MockResult<MockResultSet> {
        self.run(method, sql)?;
        self.update_count = None;

        let rows = self.script.rows();
        let limit = if self.max_rows == 0 {
            rows.len()
        } else {
            self.max_rows.min(rows.len())
        };
        Ok(MockResultSet {
            rows: rows[..limit].to_vec(),
        })
    }

    fn update(&mut self, method: &'static str, sql: &str) -> MockResult<u32> {
        self.run(method, sql)?;
        let count = self.script.update_count();
        self.update_count = Some(u64::from(count));
        Ok(count)
    }

    fn generic(&mut self, method: &'static str, sql: &str) -> MockResult<bool> {
        if is_query(sql) {
            self.query(method, sql).map(|_| true)
        } else {
            self.update(method, sql).map(|_| false)
        }
    }

    fn run_batch(&mut self, method: &'static str) -> MockResult<Vec<u32>> {
        self.ensure_open()?;
        let batch = std::mem::take(&mut self.batch);
        self.journal.record(method, None);

        if !self.script.latency().is_zero() {
            std::thread::sleep(self.script.latency());
        }
        self.executed = true;

        if let Some(err) = batch.iter().find_map(|sql| self.script.failure_for(sql)) {
            debug!(method, entries = batch.len(), error = %err, "Mock batch failure injected");
            self.update_count = None;
            return Err(err);
        }

        let count = self.script.update_count();
        self.update_count = Some(u64::from(count) * batch.len() as u64);
        Ok(vec![count; batch.len()])
    }
}

fn is_query(sql: &str) -> bool {
    let head = sql.trim_start();
    ["SELECT", "WITH", "SHOW", "CALL"]
        .iter()
        .any(|kw| head.get(..kw.len()).is_some_and(|h| h.eq_ignore_ascii_case(kw)))
}

impl Statement for MockStatement {
    type Error = MockError;
    type ResultSet = MockResultSet;

    fn execute(&mut self, sql: &str) -> MockResult<bool> {
        self.generic("execute", sql)
    }

    fn execute_query(&mut self, sql: &str) -> MockResult<MockResultSet> {
        self.query("execute_query", sql)
    }

    fn execute_update(&mut self, sql: &str) -> MockResult<u32> {
        self.update("execute_update", sql)
    }

    fn execute_large_update(&mut self, sql: &str) -> MockResult<u64> {
        self.update("execute_large_update", sql).map(u64::from)
    }

    fn add_batch(&mut self, sql: &str) -> MockResult<()> {
        self.ensure_open()?;
        self.journal.record("add_batch", Some(sql));
        self.batch.push(sql.to_string());
        Ok(())
    }

    fn clear_batch(&mut self) -> MockResult<()> {
        self.ensure_open()?;
        self.journal.record("clear_batch", None);
        self.batch.clear();
        Ok(())
    }

    fn execute_batch(&mut self) -> MockResult<Vec<u32>> {
        self.run_batch("execute_batch")
    }

    fn execute_large_batch(&mut self) -> MockResult<Vec<u64>> {
        self.run_batch("execute_large_batch")
            .map(|counts| counts.into_iter().map(u64::from).collect())
    }

    fn update_count(&self) -> MockResult<Option<u64>> {
        self.ensure_open()?;
        Ok(self.update_count)
    }

    fn set_max_rows(&mut self, max_rows: usize) -> MockResult<()> {
        self.ensure_open()?;
        self.journal.record("set_max_rows", None);
        self.max_rows = max_rows;
        Ok(())
    }

    fn max_rows(&self) -> MockResult<usize> {
        self.ensure_open()?;
        Ok(self.max_rows)
    }

    fn set_query_timeout(&mut self, timeout: Option<Duration>) -> MockResult<()> {
        self.ensure_open()?;
        self.journal.record("set_query_timeout", None);
        self.timeout = timeout;
        Ok(())
    }

    fn query_timeout(&self) -> MockResult<Option<Duration>> {
        self.ensure_open()?;
        Ok(self.timeout)
    }

    fn cancel(&mut self) -> MockResult<()> {
        self.ensure_open()?;
        self.journal.record("cancel", None);
        Ok(())
    }

    fn close(&mut self) -> MockResult<()> {
        self.journal.record("close_statement", None);
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl PreparedStatement for MockStatement {
    fn set_parameter(&mut self, index: usize, value: SqlValue) -> MockResult<()> {
        self.ensure_open()?;
        if index == 0 {
            return Err(MockError::InvalidParameterIndex(index));
        }
        self.parameters.insert(index, value);
        Ok(())
    }

    fn clear_parameters(&mut self) -> MockResult<()> {
        self.ensure_open()?;
        self.parameters.clear();
        Ok(())
    }

    fn execute_prepared(&mut self) -> MockResult<bool> {
        let sql = self.bound_template()?;
        self.generic("execute", &sql)
    }

    fn execute_query_prepared(&mut self) -> MockResult<MockResultSet> {
        let sql = self.bound_template()?;
        self.query("execute_query", &sql)
    }

    fn execute_update_prepared(&mut self) -> MockResult<u32> {
        let sql = self.bound_template()?;
        self.update("execute_update", &sql)
    }

    fn execute_large_update_prepared(&mut self) -> MockResult<u64> {
        let sql = self.bound_template()?;
        self.update("execute_large_update", &sql).map(u64::from)
    }

    fn add_batch_prepared(&mut self) -> MockResult<()> {
        let sql = self.bound_template()?;
        self.add_batch(&sql)
    }
}

impl CallableStatement for MockStatement {
    fn register_out_parameter(&mut self, index: usize, sql_type: SqlType) -> MockResult<()> {
        self.ensure_open()?;
        if index == 0 {
            return Err(MockError::InvalidParameterIndex(index));
        }
        self.out_parameters.insert(index, sql_type);
        Ok(())
    }

    fn out_parameter(&self, index: usize) -> MockResult<SqlValue> {
        self.ensure_open()?;
        if !self.out_parameters.contains_key(&index) {
            return Err(MockError::UnregisteredOutParameter(index));
        }
        if !self.executed {
            return Ok(SqlValue::Null);
        }
        Ok(self.script.out_value(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(script: MockScript, template: Option<&str>) -> (MockStatement, CallJournal) {
        let journal = CallJournal::new();
        let stmt = MockStatement::new(
            Arc::new(script),
            journal.clone(),
            template.map(str::to_string),
        );
        (stmt, journal)
    }

    #[test]
    fn test_is_query() {
        assert!(is_query("SELECT 1"));
        assert!(is_query("  select * from t"));
        assert!(!is_query("UPDATE t SET a = 1"));
        assert!(!is_query("SEL"));
    }

    #[test]
    fn test_query_respects_max_rows() {
        let rows = vec![vec![SqlValue::from(1)], vec![SqlValue::from(2)], vec![SqlValue::from(3)]];
        let (mut stmt, _) = statement(MockScript::new().with_rows(rows), None);

        assert_eq!(stmt.execute_query("SELECT n").unwrap().len(), 3);
        stmt.set_max_rows(2).unwrap();
        assert_eq!(stmt.execute_query("SELECT n").unwrap().len(), 2);
    }

    #[test]
    fn test_batch_is_cleared_after_execution() {
        let (mut stmt, journal) = statement(MockScript::new().with_update_count(2), None);

        stmt.add_batch("INSERT INTO t VALUES (1)").unwrap();
        stmt.add_batch("INSERT INTO t VALUES (2)").unwrap();
        assert_eq!(stmt.execute_batch().unwrap(), vec![2, 2]);
        assert_eq!(stmt.update_count().unwrap(), Some(4));
        assert!(stmt.pending_batch().is_empty());
        assert_eq!(journal.count("add_batch"), 2);
    }

    #[test]
    fn test_batch_failure() {
        let (mut stmt, _) = statement(MockScript::new().fail_on("bad", "boom"), None);

        stmt.add_batch("INSERT INTO good VALUES (1)").unwrap();
        stmt.add_batch("INSERT INTO bad VALUES (1)").unwrap();
        let err = stmt.execute_batch().unwrap_err();
        assert!(matches!(err, MockError::Rejected { message, .. } if message == "boom"));
    }

    #[test]
    fn test_prepared_requires_template() {
        let (mut stmt, _) = statement(MockScript::new(), None);
        assert_eq!(stmt.execute_prepared(), Err(MockError::NotPrepared));

        let (mut prepared, journal) = statement(MockScript::new(), Some("UPDATE t SET a = ?"));
        prepared.set_parameter(1, SqlValue::from(5)).unwrap();
        assert_eq!(prepared.execute_update_prepared(), Ok(1));
        assert_eq!(
            journal.last().unwrap().detail.as_deref(),
            Some("UPDATE t SET a = ?")
        );
    }

    #[test]
    fn test_out_parameters() {
        let script = MockScript::new().with_out_value(2, 42i64);
        let (mut stmt, _) = statement(script, Some("CALL next_id(?, ?)"));

        assert_eq!(
            stmt.out_parameter(2),
            Err(MockError::UnregisteredOutParameter(2))
        );
        stmt.register_out_parameter(2, SqlType::BigInt).unwrap();
        assert_eq!(stmt.out_parameter(2), Ok(SqlValue::Null));

        stmt.execute_prepared().unwrap();
        assert_eq!(stmt.out_parameter(2), Ok(SqlValue::Int(42)));
    }

    #[test]
    fn test_closed_statement() {
        let (mut stmt, _) = statement(MockScript::new(), None);
        stmt.close().unwrap();
        assert!(stmt.is_closed());
        assert_eq!(stmt.execute("SELECT 1"), Err(MockError::Closed));
    }
}
