//! Listener that keeps events in memory.

use parking_lot::RwLock;

use crate::dispatch::{ListenerResult, SqlListener};
use crate::event::{SqlEvent, SqlEventRecord};

/// A listener that collects events for later analysis.
///
/// Events past `max_events` are dropped.
pub struct CollectingListener {
    events: RwLock<Vec<SqlEventRecord>>,
    max_events: usize,
}

impl CollectingListener {
    /// Create a new collecting listener.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events,
        }
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<SqlEventRecord> {
        self.events.read().clone()
    }

    /// Remove and return collected events.
    pub fn drain(&self) -> Vec<SqlEventRecord> {
        std::mem::take(&mut *self.events.write())
    }

    /// Get the most recent event.
    pub fn last(&self) -> Option<SqlEventRecord> {
        self.events.read().last().cloned()
    }

    /// Clear collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get event count.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl Default for CollectingListener {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl SqlListener for CollectingListener {
    fn on_event(&self, event: &SqlEvent<'_>) -> ListenerResult {
        let mut events = self.events.write();
        if events.len() < self.max_events {
            events.push(event.to_record());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "collecting"
    }
}

impl std::fmt::Debug for CollectingListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectingListener")
            .field("len", &self.len())
            .field("max_events", &self.max_events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_listener() {
        let listener = CollectingListener::new(100);

        listener
            .on_event(&SqlEvent::builder(Some("SELECT 1")).build())
            .unwrap();

        assert_eq!(listener.len(), 1);
        assert_eq!(listener.last().unwrap().sql, "SELECT 1");
    }

    #[test]
    fn test_collecting_listener_max_events() {
        let listener = CollectingListener::new(2);

        for i in 0..5 {
            let sql = format!("SELECT {i}");
            listener
                .on_event(&SqlEvent::builder(Some(sql.as_str())).build())
                .unwrap();
        }

        assert_eq!(listener.len(), 2);
        assert_eq!(listener.events()[1].sql, "SELECT 1");
    }

    #[test]
    fn test_drain() {
        let listener = CollectingListener::default();
        listener.on_event(&SqlEvent::builder(None).build()).unwrap();

        let drained = listener.drain();
        assert_eq!(drained.len(), 1);
        assert!(listener.is_empty());
    }
}
