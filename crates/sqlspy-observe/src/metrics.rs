//! Aggregated statement metrics.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::dispatch::{ListenerResult, SqlListener};
use crate::event::SqlEvent;

/// Default slow-statement threshold.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(1000);

/// Default number of distinct SQL texts tracked individually.
pub const DEFAULT_MAX_DISTINCT_SQL: usize = 10_000;

/// Listener that aggregates events into counters.
pub struct MetricsListener {
    totals: RwLock<StatementTotals>,
    by_sql: DashMap<String, SqlStats>,
    slow_threshold: Duration,
    max_distinct_sql: usize,
}

impl MetricsListener {
    /// Create a listener with the default slow threshold.
    pub fn new() -> Self {
        Self::with_slow_threshold(DEFAULT_SLOW_THRESHOLD)
    }

    /// Create a listener counting statements at or above `threshold` as slow.
    pub fn with_slow_threshold(threshold: Duration) -> Self {
        Self {
            totals: RwLock::new(StatementTotals::new()),
            by_sql: DashMap::new(),
            slow_threshold: threshold,
            max_distinct_sql: DEFAULT_MAX_DISTINCT_SQL,
        }
    }

    /// Track at most `limit` distinct SQL texts.
    ///
    /// Once full, executions of texts not already tracked only count toward
    /// [`SqlMetricsSnapshot::untracked_statements`].
    pub fn with_max_distinct_sql(mut self, limit: usize) -> Self {
        self.max_distinct_sql = limit;
        self
    }

    /// The distinct SQL limit in use.
    pub fn max_distinct_sql(&self) -> usize {
        self.max_distinct_sql
    }

    /// The slow threshold in use.
    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    /// Record one event.
    pub fn record(&self, event: &SqlEvent<'_>) {
        let elapsed_ms = event.elapsed_ms();
        let batch_size = event.batch_size() as u64;

        // Holding the totals lock keeps the map within its limit.
        let mut totals = self.totals.write();
        totals.total_statements += 1;
        if event.is_success() {
            totals.successful_statements += 1;
        } else {
            totals.failed_statements += 1;
        }
        if batch_size > 1 {
            totals.batch_executions += 1;
        }
        totals.batched_rows += batch_size;
        totals.total_elapsed_ms += elapsed_ms;
        totals.min_elapsed_ms = Some(
            totals
                .min_elapsed_ms
                .map_or(elapsed_ms, |min| min.min(elapsed_ms)),
        );
        totals.max_elapsed_ms = totals.max_elapsed_ms.max(elapsed_ms);
        if event.elapsed() >= self.slow_threshold {
            totals.slow_statements += 1;
        }

        let sql = event.sql();
        let stats = match self.by_sql.get_mut(sql) {
            Some(stats) => Some(stats),
            None if self.by_sql.len() < self.max_distinct_sql => {
                Some(self.by_sql.entry(sql.to_string()).or_default())
            }
            None => None,
        };
        match stats {
            Some(mut stats) => {
                stats.count += 1;
                stats.total_elapsed_ms += elapsed_ms;
                if !event.is_success() {
                    stats.failures += 1;
                }
            }
            None => totals.untracked_statements += 1,
        }
    }

    /// Get a snapshot of the collected metrics.
    pub fn snapshot(&self) -> SqlMetricsSnapshot {
        let totals = self.totals.read().clone();
        let avg_elapsed_ms = if totals.total_statements == 0 {
            0.0
        } else {
            totals.total_elapsed_ms as f64 / totals.total_statements as f64
        };

        SqlMetricsSnapshot {
            total_statements: totals.total_statements,
            successful_statements: totals.successful_statements,
            failed_statements: totals.failed_statements,
            batch_executions: totals.batch_executions,
            batched_rows: totals.batched_rows,
            slow_statements: totals.slow_statements,
            total_elapsed_ms: totals.total_elapsed_ms,
            min_elapsed_ms: totals.min_elapsed_ms.unwrap_or(0),
            max_elapsed_ms: totals.max_elapsed_ms,
            avg_elapsed_ms,
            untracked_statements: totals.untracked_statements,
            by_sql: self
                .by_sql
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            period_start: totals.period_start,
        }
    }

    /// The `limit` statements executed most often, most frequent first.
    pub fn top_statements(&self, limit: usize) -> Vec<(String, SqlStats)> {
        let mut all: Vec<_> = self
            .by_sql
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(&b.0)));
        all.truncate(limit);
        all
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        *self.totals.write() = StatementTotals::new();
        self.by_sql.clear();
    }
}

impl Default for MetricsListener {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlListener for MetricsListener {
    fn on_event(&self, event: &SqlEvent<'_>) -> ListenerResult {
        self.record(event);
        Ok(())
    }

    fn name(&self) -> &str {
        "metrics"
    }
}

impl std::fmt::Debug for MetricsListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsListener")
            .field("totals", &*self.totals.read())
            .field("distinct_sql", &self.by_sql.len())
            .field("slow_threshold", &self.slow_threshold)
            .field("max_distinct_sql", &self.max_distinct_sql)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct StatementTotals {
    total_statements: u64,
    successful_statements: u64,
    failed_statements: u64,
    batch_executions: u64,
    batched_rows: u64,
    slow_statements: u64,
    total_elapsed_ms: u64,
    min_elapsed_ms: Option<u64>,
    max_elapsed_ms: u64,
    untracked_statements: u64,
    period_start: DateTime<Utc>,
}

impl StatementTotals {
    fn new() -> Self {
        Self {
            total_statements: 0,
            successful_statements: 0,
            failed_statements: 0,
            batch_executions: 0,
            batched_rows: 0,
            slow_statements: 0,
            total_elapsed_ms: 0,
            min_elapsed_ms: None,
            max_elapsed_ms: 0,
            untracked_statements: 0,
            period_start: Utc::now(),
        }
    }
}

/// Per-statement counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlStats {
    /// Number of executions.
    pub count: u64,
    /// Number of failed executions.
    pub failures: u64,
    /// Total elapsed time in milliseconds.
    pub total_elapsed_ms: u64,
}

/// Snapshot of collected statement metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlMetricsSnapshot {
    /// Execution calls observed.
    pub total_statements: u64,
    /// Calls that succeeded.
    pub successful_statements: u64,
    /// Calls that failed.
    pub failed_statements: u64,
    /// Batch executions with more than one queued statement.
    pub batch_executions: u64,
    /// Sum of batch sizes over all calls.
    pub batched_rows: u64,
    /// Calls at or above the slow threshold.
    pub slow_statements: u64,
    /// Total elapsed time in milliseconds.
    pub total_elapsed_ms: u64,
    /// Fastest call.
    pub min_elapsed_ms: u64,
    /// Slowest call.
    pub max_elapsed_ms: u64,
    /// Mean elapsed time.
    pub avg_elapsed_ms: f64,
    /// Calls whose SQL text arrived after the distinct limit was reached.
    #[serde(default)]
    pub untracked_statements: u64,
    /// Counters keyed by SQL text.
    pub by_sql: HashMap<String, SqlStats>,
    /// When counting started.
    pub period_start: DateTime<Utc>,
}
