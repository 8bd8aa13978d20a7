//! # SqlSpy - Statement Observation for Database Clients
//!
//! SqlSpy wraps a database connection, data source or driver so every SQL
//! statement executed through it is reported to listeners: its text, how long
//! it took, whether it failed and how many statements a batch carried. The
//! wrapped handles behave exactly like the real ones.
//!
//! ## Features
//!
//! - **Transparent**: results and errors come back unchanged
//! - **Pluggable**: log through `tracing`, print p6spy-style blocks, collect
//!   metrics, or implement [`SqlListener`] yourself
//! - **Isolated**: a failing or panicking listener never reaches your code
//! - **Configurable**: pick listeners and driver prefixes from a TOML file
//!
//! ## Quick Start
//!
//! ```ignore
//! use sqlspy::prelude::*;
//!
//! let spy = SqlSpy::builder()
//!     .with_tracing(true)
//!     .with_metrics(true)
//!     .build()?;
//!
//! let mut conn = spy.wrap_connection(real_conn);
//! conn.create_statement()?.execute("SELECT 1")?;
//!
//! let snapshot = spy.metrics().map(|m| m.snapshot());
//! ```
//!
//! Or, without a builder:
//!
//! ```ignore
//! let mut conn = sqlspy::wrap_with_tracing(real_conn);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Your Application                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                     sqlspy (facade)                     │
//! │        SqlSpyBuilder · SpyDataSource · SpyDriver        │
//! ├────────────────────────────┬────────────────────────────┤
//! │        sqlspy-core         │       sqlspy-observe       │
//! │  (SpyConnection,           │  (SqlEvent, listeners,     │
//! │   SpyStatement)            │   dispatch, metrics)       │
//! ├────────────────────────────┴────────────────────────────┤
//! │                  Your database driver                   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod datasource;

use std::sync::Arc;
use std::time::Duration;

use sqlspy_core::{Connection, DataSource, Driver, SpyConnection};
use sqlspy_observe::{
    ConsoleListener, EventDispatcher, MetricsListener, SharedListener, SqlListener,
    TracingListener,
};
use tracing::debug;

pub use config::{ConfigError, SpyConfig};
pub use datasource::{SpyDataSource, SpyDriver};

// Re-export from sub-crates
pub use sqlspy_core;
pub use sqlspy_observe;

/// Main entry point for SqlSpy.
pub struct SqlSpy;

impl SqlSpy {
    /// Create a new spy builder.
    pub fn builder() -> SqlSpyBuilder {
        SqlSpyBuilder::new()
    }

    /// Create a spy from a configuration.
    pub fn from_config(config: SpyConfig) -> Result<Spy, SqlSpyError> {
        SqlSpyBuilder::new().with_config(config).build()
    }
}

/// Builder for configuring a [`Spy`].
///
/// Built-in listeners (tracing, console, metrics, in that order) are
/// registered before the listeners added with
/// [`with_listener`](Self::with_listener).
pub struct SqlSpyBuilder {
    config: SpyConfig,
    listeners: Vec<SharedListener>,
}

impl SqlSpyBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: SpyConfig::default(),
            listeners: Vec::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: SpyConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a listener.
    pub fn with_listener(mut self, listener: SharedListener) -> Self {
        self.listeners.push(listener);
        self
    }

    // Built-in listeners

    /// Enable or disable the tracing listener.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.config.tracing.enabled = enabled;
        self
    }

    /// Log successes slower than `threshold` as warnings.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.config = self.config.with_slow_query_threshold(threshold);
        self
    }

    /// Enable or disable the console listener.
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Enable or disable the metrics listener.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.config.metrics.enabled = enabled;
        self
    }

    /// Build the spy.
    pub fn build(self) -> Result<Spy, SqlSpyError> {
        self.config.validate()?;

        let mut listeners: Vec<SharedListener> = Vec::new();

        if self.config.tracing.enabled {
            let mut tracing_listener = TracingListener::new();
            if let Some(threshold) = self.config.tracing.slow_query_threshold() {
                tracing_listener = tracing_listener.with_slow_threshold(threshold);
            }
            listeners.push(Arc::new(tracing_listener));
        }

        if self.config.console.enabled {
            listeners.push(Arc::new(
                ConsoleListener::new().with_color(self.config.console.color),
            ));
        }

        let metrics = self.config.metrics.enabled.then(|| {
            Arc::new(
                MetricsListener::with_slow_threshold(self.config.metrics.slow_query_threshold())
                    .with_max_distinct_sql(self.config.metrics.max_distinct_sql),
            )
        });
        if let Some(metrics) = &metrics {
            listeners.push(Arc::clone(metrics) as SharedListener);
        }

        listeners.extend(self.listeners);

        let dispatcher = EventDispatcher::new(listeners);
        debug!(
            listeners = dispatcher.listener_count(),
            names = ?dispatcher.listeners().iter().map(|l| l.name()).collect::<Vec<_>>(),
            "Spy built"
        );

        Ok(Spy {
            dispatcher,
            metrics,
            config: self.config,
        })
    }
}

impl Default for SqlSpyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured spy.
///
/// Every handle it wraps reports to the same listeners.
#[derive(Clone)]
pub struct Spy {
    dispatcher: EventDispatcher,
    metrics: Option<Arc<MetricsListener>>,
    config: SpyConfig,
}

impl Spy {
    /// Instrument a connection.
    pub fn wrap_connection<C: Connection>(&self, conn: C) -> SpyConnection<C> {
        SpyConnection::new(conn, self.dispatcher.clone())
    }

    /// Instrument every connection of a data source.
    pub fn wrap_data_source<D: DataSource>(&self, source: D) -> SpyDataSource<D> {
        SpyDataSource::new(source, self.dispatcher.clone())
    }

    /// Instrument a driver under the configured URL prefix.
    pub fn wrap_driver<D: Driver>(&self, driver: D) -> SpyDriver<D> {
        SpyDriver::new(driver, self.dispatcher.clone()).with_config(&self.config.driver)
    }

    /// The metrics listener, when enabled.
    pub fn metrics(&self) -> Option<&Arc<MetricsListener>> {
        self.metrics.as_ref()
    }

    /// The listeners wrapped handles report to.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// The configuration the spy was built from.
    pub fn config(&self) -> &SpyConfig {
        &self.config
    }
}

impl std::fmt::Debug for Spy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spy")
            .field("listeners", &self.dispatcher.listener_count())
            .field("metrics", &self.metrics.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// Instrument `conn`, reporting to `listeners`.
pub fn wrap<C: Connection>(
    conn: C,
    listeners: impl IntoIterator<Item = SharedListener>,
) -> SpyConnection<C> {
    sqlspy_core::wrap(conn, listeners)
}

/// Instrument `conn`, logging every statement through `tracing`.
pub fn wrap_with_tracing<C: Connection>(conn: C) -> SpyConnection<C> {
    wrap(conn, [shared(TracingListener::new())])
}

/// Instrument `conn`, printing every statement to stdout in the p6spy format.
pub fn wrap_with_console<C: Connection>(conn: C) -> SpyConnection<C> {
    wrap(conn, [shared(ConsoleListener::new())])
}

/// Instrument every connection of `source`, reporting to `listeners`.
pub fn wrap_data_source<D: DataSource>(
    source: D,
    listeners: impl IntoIterator<Item = SharedListener>,
) -> SpyDataSource<D> {
    SpyDataSource::new(source, EventDispatcher::new(listeners))
}

fn shared(listener: impl SqlListener + 'static) -> SharedListener {
    Arc::new(listener)
}

/// Errors from building a spy.
#[derive(Debug, thiserror::Error)]
pub enum SqlSpyError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::config::SpyConfig;
    pub use crate::datasource::{SpyDataSource, SpyDriver};
    pub use crate::{Spy, SqlSpy, SqlSpyBuilder, SqlSpyError};

    // Capability traits
    pub use sqlspy_core::{
        CallableStatement, Connection, DataSource, Driver, PreparedStatement, SpyConnection,
        SpyStatement, SqlType, SqlValue, Statement,
    };

    // Observability types
    pub use sqlspy_observe::{
        CollectingListener, ConsoleListener, EventDispatcher, MetricsListener, SharedListener,
        SqlEvent, SqlEventRecord, SqlListener, TracingListener,
    };

    // Common std types
    pub use std::sync::Arc;
    pub use std::time::Duration;
}
