//! Entry points handing out mock connections.

use std::sync::Arc;

use sqlspy_core::{DataSource, Driver, Properties};
use tracing::debug;

use crate::connection::MockConnection;
use crate::error::MockResult;
use crate::journal::CallJournal;
use crate::script::MockScript;

/// URL prefix the mock driver accepts.
pub const MOCK_URL_PREFIX: &str = "jdbc:mock:";

/// A driver opening mock connections for `jdbc:mock:` URLs.
///
/// All connections share the driver's script and journal.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    script: Arc<MockScript>,
    journal: CallJournal,
}

impl MockDriver {
    /// Create a driver following `script`.
    pub fn new(script: MockScript) -> Self {
        Self {
            script: Arc::new(script),
            journal: CallJournal::new(),
        }
    }

    /// Calls made through any connection of this driver.
    pub fn journal(&self) -> &CallJournal {
        &self.journal
    }
}

impl Driver for MockDriver {
    type Connection = MockConnection;

    fn accepts_url(&self, url: &str) -> bool {
        url.starts_with(MOCK_URL_PREFIX)
    }

    fn connect(&self, url: &str, properties: &Properties) -> MockResult<Option<MockConnection>> {
        if !self.accepts_url(url) {
            return Ok(None);
        }
        self.journal.record("connect", Some(url));

        let conn = MockConnection::with_journal(Arc::clone(&self.script), self.journal.clone());
        let conn = match properties.get("user") {
            Some(user) => {
                self.script.check_user(user)?;
                conn.with_user(user)
            }
            None => conn,
        };
        debug!(url, "Mock connection opened");
        Ok(Some(conn))
    }
}

/// A data source of mock connections.
#[derive(Debug, Clone, Default)]
pub struct MockDataSource {
    script: Arc<MockScript>,
    journal: CallJournal,
    default_user: Option<String>,
}

impl MockDataSource {
    /// Create a data source following `script`.
    pub fn new(script: MockScript) -> Self {
        Self {
            script: Arc::new(script),
            journal: CallJournal::new(),
            default_user: None,
        }
    }

    /// User for [`DataSource::connection`].
    pub fn with_default_user(mut self, user: impl Into<String>) -> Self {
        self.default_user = Some(user.into());
        self
    }

    /// Calls made through any connection of this data source.
    pub fn journal(&self) -> &CallJournal {
        &self.journal
    }

    fn open(&self, user: Option<&str>) -> MockResult<MockConnection> {
        self.journal.record("connection", user);
        let conn = MockConnection::with_journal(Arc::clone(&self.script), self.journal.clone());
        match user {
            Some(user) => {
                self.script.check_user(user)?;
                Ok(conn.with_user(user))
            }
            None => Ok(conn),
        }
    }
}

impl DataSource for MockDataSource {
    type Connection = MockConnection;

    fn connection(&self) -> MockResult<MockConnection> {
        self.open(self.default_user.as_deref())
    }

    fn connection_with_credentials(
        &self,
        user: &str,
        _password: &str,
    ) -> MockResult<MockConnection> {
        self.open(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MockError;

    #[test]
    fn test_driver_accepts_only_mock_urls() {
        let driver = MockDriver::default();

        assert!(driver.accepts_url("jdbc:mock:test"));
        assert!(!driver.accepts_url("jdbc:mysql://localhost/db"));
        let props = Properties::new();
        assert!(driver.connect("jdbc:mysql://localhost/db", &props).unwrap().is_none());
        assert!(driver.connect("jdbc:mock:test", &props).unwrap().is_some());
        assert_eq!(driver.journal().count("connect"), 1);
    }

    #[test]
    fn test_driver_user_property() {
        let driver = MockDriver::new(MockScript::new().with_accepted_users(["app"]));

        let mut props = Properties::new();
        props.insert("user".to_string(), "app".to_string());
        let conn = driver.connect("jdbc:mock:db", &props).unwrap().unwrap();
        assert_eq!(conn.user(), Some("app"));

        props.insert("user".to_string(), "root".to_string());
        let err = driver.connect("jdbc:mock:db", &props).unwrap_err();
        assert_eq!(err, MockError::AccessDenied("root".to_string()));
    }

    #[test]
    fn test_data_source_credentials() {
        let source = MockDataSource::new(MockScript::new()).with_default_user("app");

        assert_eq!(source.connection().unwrap().user(), Some("app"));
        let conn = source.connection_with_credentials("report", "secret").unwrap();
        assert_eq!(conn.user(), Some("report"));
        assert_eq!(source.journal().count("connection"), 2);
    }
}
