//! SqlSpy Observability
//!
//! This crate holds the event side of SqlSpy:
//!
//! - [`SqlEvent`]: Immutable record of one statement execution
//! - [`SqlListener`]: Contract for event consumers
//! - [`EventDispatcher`]: Failure-isolating, ordered delivery to listeners
//! - Built-in listeners for logs, the console, tests and metrics
//!
//! # Listening to statements
//!
//! ```ignore
//! use std::sync::Arc;
//! use sqlspy_observe::{EventDispatcher, SharedListener, TracingListener, CollectingListener};
//!
//! let collector = Arc::new(CollectingListener::new(1_000));
//! let dispatcher = EventDispatcher::new([
//!     Arc::new(TracingListener::new()) as SharedListener,
//!     Arc::clone(&collector) as SharedListener,
//! ]);
//!
//! dispatcher.dispatch(&SqlEvent::builder(Some("SELECT 1")).build());
//! assert_eq!(collector.len(), 1);
//! ```
//!
//! # Metrics
//!
//! ```ignore
//! use sqlspy_observe::MetricsListener;
//!
//! let metrics = Arc::new(MetricsListener::new());
//! // ... register it, run statements ...
//! let snapshot = metrics.snapshot();
//! println!("{} statements, {} failed", snapshot.total_statements, snapshot.failed_statements);
//! ```

pub mod dispatch;
pub mod event;
pub mod listeners;
pub mod metrics;

// Re-export main types
pub use dispatch::{EventDispatcher, ListenerError, ListenerResult, SharedListener, SqlListener};
pub use event::{SqlEvent, SqlEventBuilder, SqlEventRecord, UNKNOWN_SQL};
pub use listeners::{CollectingListener, ConsoleListener, TracingListener};
pub use metrics::{MetricsListener, SqlMetricsSnapshot, SqlStats};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::dispatch::{EventDispatcher, SharedListener, SqlListener};
    pub use crate::event::{SqlEvent, SqlEventRecord};
    pub use crate::listeners::{CollectingListener, ConsoleListener, TracingListener};
    pub use crate::metrics::MetricsListener;
}
