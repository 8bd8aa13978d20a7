//! Instrumented connection factories.
//!
//! [`SpyDataSource`] and [`SpyDriver`] wrap every connection they hand out,
//! so code that obtains connections from a pool or a URL needs no change to
//! be observed.

use std::fmt;

use sqlspy_core::{DataSource, DataSourceError, Driver, DriverError, Properties, SpyConnection};
use sqlspy_observe::EventDispatcher;
use tracing::debug;

use crate::config::{DEFAULT_DELEGATE_PREFIX, DEFAULT_URL_PREFIX, DriverConfig};

/// A data source whose connections report to a fixed set of listeners.
pub struct SpyDataSource<D> {
    inner: D,
    dispatcher: EventDispatcher,
}

impl<D: DataSource> SpyDataSource<D> {
    /// Wrap `inner`.
    pub fn new(inner: D, dispatcher: EventDispatcher) -> Self {
        Self { inner, dispatcher }
    }
}

impl<D> SpyDataSource<D> {
    /// Borrow the real data source.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Unwrap the real data source.
    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: DataSource> DataSource for SpyDataSource<D> {
    type Connection = SpyConnection<D::Connection>;

    fn connection(&self) -> Result<Self::Connection, DataSourceError<Self>> {
        let conn = self.inner.connection()?;
        Ok(SpyConnection::new(conn, self.dispatcher.clone()))
    }

    fn connection_with_credentials(
        &self,
        user: &str,
        password: &str,
    ) -> Result<Self::Connection, DataSourceError<Self>> {
        let conn = self.inner.connection_with_credentials(user, password)?;
        Ok(SpyConnection::new(conn, self.dispatcher.clone()))
    }
}

impl<D: fmt::Debug> fmt::Debug for SpyDataSource<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpyDataSource")
            .field("inner", &self.inner)
            .field("listeners", &self.dispatcher.listener_count())
            .finish()
    }
}

/// A driver claiming URLs with a spy prefix.
///
/// `jdbc:sqlspy:mysql://host/db` is opened as `jdbc:mysql://host/db` through
/// the wrapped driver, and the connection comes back instrumented. URLs
/// without the prefix are not claimed.
pub struct SpyDriver<D> {
    inner: D,
    dispatcher: EventDispatcher,
    url_prefix: String,
    delegate_prefix: String,
}

impl<D: Driver> SpyDriver<D> {
    /// Wrap `inner` with the default prefixes.
    pub fn new(inner: D, dispatcher: EventDispatcher) -> Self {
        Self {
            inner,
            dispatcher,
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            delegate_prefix: DEFAULT_DELEGATE_PREFIX.to_string(),
        }
    }

    /// Use the prefixes from `config`.
    pub fn with_config(self, config: &DriverConfig) -> Self {
        self.with_prefixes(config.url_prefix.clone(), config.delegate_prefix.clone())
    }

    /// Claim `url_prefix` and rewrite it to `delegate_prefix`.
    pub fn with_prefixes(
        mut self,
        url_prefix: impl Into<String>,
        delegate_prefix: impl Into<String>,
    ) -> Self {
        self.url_prefix = url_prefix.into();
        self.delegate_prefix = delegate_prefix.into();
        self
    }
}

impl<D> SpyDriver<D> {
    /// The claimed prefix.
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// The prefix claimed URLs are rewritten to.
    pub fn delegate_prefix(&self) -> &str {
        &self.delegate_prefix
    }

    /// The URL handed to the wrapped driver, or `None` if `url` is not claimed.
    pub fn delegate_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(self.url_prefix.as_str())
            .map(|rest| format!("{}{}", self.delegate_prefix, rest))
    }

    /// Borrow the real driver.
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Driver> Driver for SpyDriver<D> {
    type Connection = SpyConnection<D::Connection>;

    fn accepts_url(&self, url: &str) -> bool {
        url.starts_with(self.url_prefix.as_str())
    }

    fn connect(
        &self,
        url: &str,
        properties: &Properties,
    ) -> Result<Option<Self::Connection>, DriverError<Self>> {
        let Some(real_url) = self.delegate_url(url) else {
            return Ok(None);
        };
        debug!(url, delegate_url = %real_url, "Connecting through spy driver");

        let conn = self.inner.connect(&real_url, properties)?;
        Ok(conn.map(|c: D::Connection| SpyConnection::new(c, self.dispatcher.clone())))
    }
}

impl<D: fmt::Debug> fmt::Debug for SpyDriver<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpyDriver")
            .field("inner", &self.inner)
            .field("url_prefix", &self.url_prefix)
            .field("delegate_prefix", &self.delegate_prefix)
            .field("listeners", &self.dispatcher.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use sqlspy_core::{Connection, Statement};
    use sqlspy_mock::{MockDataSource, MockDriver, MockError, MockScript};
    use sqlspy_observe::{CollectingListener, SharedListener};

    fn dispatcher() -> (Arc<CollectingListener>, EventDispatcher) {
        let collector = Arc::new(CollectingListener::default());
        let shared: SharedListener = collector.clone();
        (collector, EventDispatcher::new([shared]))
    }

    #[test]
    fn test_data_source_wraps_connections() {
        let (events, dispatcher) = dispatcher();
        let source = SpyDataSource::new(MockDataSource::new(MockScript::new()), dispatcher);

        let mut conn = source.connection().unwrap();
        conn.create_statement().unwrap().execute("SELECT 1").unwrap();

        let mut other = source.connection_with_credentials("app", "secret").unwrap();
        other.create_statement().unwrap().execute("SELECT 2").unwrap();

        assert_eq!(events.len(), 2);
        assert_ne!(conn.id(), other.id());
        assert_eq!(other.inner().user(), Some("app"));
    }

    #[test]
    fn test_data_source_errors_propagate() {
        let (events, dispatcher) = dispatcher();
        let script = MockScript::new().with_accepted_users(["app"]);
        let source = SpyDataSource::new(MockDataSource::new(script), dispatcher);

        let err = source.connection_with_credentials("root", "x").unwrap_err();
        assert_eq!(err, MockError::AccessDenied("root".to_string()));
        assert!(events.is_empty());
    }

    #[test]
    fn test_driver_rewrites_prefix() {
        let (events, dispatcher) = dispatcher();
        let driver = SpyDriver::new(MockDriver::default(), dispatcher)
            .with_prefixes("jdbc:sqlspy:", "jdbc:");

        assert!(driver.accepts_url("jdbc:sqlspy:mock:orders"));
        assert!(!driver.accepts_url("jdbc:mock:orders"));
        assert_eq!(
            driver.delegate_url("jdbc:sqlspy:mock:orders").as_deref(),
            Some("jdbc:mock:orders")
        );

        let mut conn = driver
            .connect("jdbc:sqlspy:mock:orders", &Properties::new())
            .unwrap()
            .unwrap();
        conn.create_statement().unwrap().execute("SELECT 1").unwrap();

        assert_eq!(events.len(), 1);
        let connect = driver.inner().journal().calls()[0].clone();
        assert_eq!(connect.method, "connect");
        assert_eq!(connect.detail.as_deref(), Some("jdbc:mock:orders"));
    }

    #[test]
    fn test_driver_ignores_foreign_urls() {
        let (_, dispatcher) = dispatcher();
        let driver = SpyDriver::new(MockDriver::default(), dispatcher);

        let conn = driver.connect("jdbc:mock:orders", &Properties::new()).unwrap();
        assert!(conn.is_none());
        assert!(driver.inner().journal().is_empty());
    }

    #[test]
    fn test_driver_delegate_declines() {
        let (_, dispatcher) = dispatcher();
        let driver = SpyDriver::new(MockDriver::default(), dispatcher);

        // rewritten to jdbc:postgresql:..., which the mock does not accept
        let conn = driver
            .connect("jdbc:sqlspy:postgresql://localhost/db", &Properties::new())
            .unwrap();
        assert!(conn.is_none());
    }

    #[test]
    fn test_driver_with_config() {
        let (_, dispatcher) = dispatcher();
        let config = DriverConfig {
            url_prefix: "jdbc:trace:".to_string(),
            delegate_prefix: "jdbc:mock:".to_string(),
        };
        let driver = SpyDriver::new(MockDriver::default(), dispatcher).with_config(&config);

        assert_eq!(driver.url_prefix(), "jdbc:trace:");
        assert_eq!(driver.delegate_url("jdbc:trace:db").as_deref(), Some("jdbc:mock:db"));
    }
}
