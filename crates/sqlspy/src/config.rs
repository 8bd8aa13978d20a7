//! Configuration for SqlSpy.
//!
//! A [`SpyConfig`] decides which built-in listeners a [`Spy`](crate::Spy)
//! starts with and how the spy driver rewrites URLs. It is usually loaded
//! from TOML:
//!
//! ```toml
//! [tracing]
//! enabled = true
//! slow_query_threshold_ms = 500
//!
//! [console]
//! enabled = false
//! color = true
//!
//! [metrics]
//! enabled = false
//! slow_query_threshold_ms = 1000
//! max_distinct_sql = 10000
//!
//! [driver]
//! url_prefix = "jdbc:sqlspy:"
//! delegate_prefix = "jdbc:"
//! ```
//!
//! Every section and key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// URL prefix the spy driver claims by default.
pub const DEFAULT_URL_PREFIX: &str = "jdbc:sqlspy:";

/// Prefix the spy prefix is rewritten to by default.
pub const DEFAULT_DELEGATE_PREFIX: &str = "jdbc:";

/// Errors loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config '{path}': {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config value for '{key}': {reason}")]
    Invalid {
        /// Dotted key of the value.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Complete SqlSpy configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpyConfig {
    /// Log every statement through `tracing`.
    pub tracing: TracingConfig,
    /// Print every statement to the console.
    pub console: ConsoleConfig,
    /// Aggregate statement metrics.
    pub metrics: MetricsConfig,
    /// URL rewriting of the spy driver.
    pub driver: DriverConfig,
}

impl SpyConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: SpyConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.driver.url_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                key: "driver.url_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if self.metrics.max_distinct_sql == 0 {
            return Err(ConfigError::Invalid {
                key: "metrics.max_distinct_sql",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.driver.url_prefix == self.driver.delegate_prefix {
            return Err(ConfigError::Invalid {
                key: "driver.delegate_prefix",
                reason: "must differ from driver.url_prefix".to_string(),
            });
        }
        Ok(())
    }

    /// Enable or disable the tracing listener.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing.enabled = enabled;
        self
    }

    /// Enable or disable the console listener.
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.console.enabled = enabled;
        self
    }

    /// Enable or disable console colours.
    pub fn with_color(mut self, enabled: bool) -> Self {
        self.console.color = enabled;
        self
    }

    /// Enable or disable the metrics listener.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics.enabled = enabled;
        self
    }

    /// Log successes slower than `threshold` as warnings.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.tracing.slow_query_threshold_ms = Some(duration_ms(threshold));
        self
    }

    /// Set the spy driver's URL prefixes.
    pub fn with_driver_prefixes(
        mut self,
        url_prefix: impl Into<String>,
        delegate_prefix: impl Into<String>,
    ) -> Self {
        self.driver.url_prefix = url_prefix.into();
        self.driver.delegate_prefix = delegate_prefix.into();
        self
    }
}

/// The `[tracing]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingConfig {
    /// Register the tracing listener.
    pub enabled: bool,
    /// Successes slower than this are logged as warnings.
    pub slow_query_threshold_ms: Option<u64>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            slow_query_threshold_ms: None,
        }
    }
}

impl TracingConfig {
    /// The slow-query threshold as a duration.
    pub fn slow_query_threshold(&self) -> Option<Duration> {
        self.slow_query_threshold_ms.map(Duration::from_millis)
    }
}

/// The `[console]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Register the console listener.
    pub enabled: bool,
    /// Wrap output in ANSI red.
    pub color: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            color: true,
        }
    }
}

/// The `[metrics]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Register the metrics listener.
    pub enabled: bool,
    /// Statements slower than this count as slow.
    pub slow_query_threshold_ms: u64,
    /// Distinct SQL texts tracked individually.
    pub max_distinct_sql: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            slow_query_threshold_ms: duration_ms(sqlspy_observe::metrics::DEFAULT_SLOW_THRESHOLD),
            max_distinct_sql: sqlspy_observe::metrics::DEFAULT_MAX_DISTINCT_SQL,
        }
    }
}

impl MetricsConfig {
    /// The slow-query threshold as a duration.
    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_threshold_ms)
    }
}

/// The `[driver]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// URLs starting with this are claimed by the spy driver.
    pub url_prefix: String,
    /// What the claimed prefix is rewritten to before delegating.
    pub delegate_prefix: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            delegate_prefix: DEFAULT_DELEGATE_PREFIX.to_string(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SpyConfig::default();

        assert!(config.tracing.enabled);
        assert!(!config.console.enabled);
        assert!(config.console.color);
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.slow_query_threshold(), Duration::from_secs(1));
        assert_eq!(config.driver.url_prefix, "jdbc:sqlspy:");
        assert_eq!(config.driver.delegate_prefix, "jdbc:");
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(SpyConfig::from_toml_str("").unwrap(), SpyConfig::default());
    }

    #[test]
    fn test_parse_full_document() {
        let config = SpyConfig::from_toml_str(
            r#"
            [tracing]
            enabled = false
            slow_query_threshold_ms = 250

            [console]
            enabled = true
            color = false

            [metrics]
            enabled = true
            slow_query_threshold_ms = 50
            max_distinct_sql = 200

            [driver]
            url_prefix = "jdbc:trace:"
            delegate_prefix = "jdbc:postgresql:"
            "#,
        )
        .unwrap();

        assert!(!config.tracing.enabled);
        assert_eq!(
            config.tracing.slow_query_threshold(),
            Some(Duration::from_millis(250))
        );
        assert!(config.console.enabled);
        assert!(!config.console.color);
        assert_eq!(config.metrics.slow_query_threshold_ms, 50);
        assert_eq!(config.metrics.max_distinct_sql, 200);
        assert_eq!(config.driver.url_prefix, "jdbc:trace:");
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config = SpyConfig::from_toml_str("[console]\nenabled = true\n").unwrap();

        assert!(config.console.enabled);
        assert!(config.console.color);
        assert!(config.tracing.enabled);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = SpyConfig::from_toml_str("[console]\ncolour = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_prefix() {
        let err = SpyConfig::from_toml_str("[driver]\nurl_prefix = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "driver.url_prefix", .. }));

        let err = SpyConfig::new()
            .with_driver_prefixes("jdbc:", "jdbc:")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "driver.delegate_prefix", .. }));
    }

    #[test]
    fn test_zero_distinct_sql_limit() {
        let err = SpyConfig::from_toml_str("[metrics]\nmax_distinct_sql = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "metrics.max_distinct_sql", .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = SpyConfig::load("/nonexistent/sqlspy.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_builder_methods() {
        let config = SpyConfig::new()
            .with_tracing(false)
            .with_console(true)
            .with_color(false)
            .with_metrics(true)
            .with_slow_query_threshold(Duration::from_millis(75));

        assert!(!config.tracing.enabled);
        assert!(config.console.enabled);
        assert!(!config.console.color);
        assert!(config.metrics.enabled);
        assert_eq!(config.tracing.slow_query_threshold_ms, Some(75));
    }
}
