//! Record of the calls that reached the mock driver.

use std::sync::Arc;

use parking_lot::Mutex;

/// One call that reached the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Driver method name.
    pub method: &'static str,
    /// SQL text or URL the call carried.
    pub detail: Option<String>,
}

/// Shared, append-only list of driver calls.
///
/// Clones share the same list, so a test can keep a handle while the driver
/// writes to it.
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallJournal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, method: &'static str, detail: Option<&str>) {
        self.calls.lock().push(Call {
            method,
            detail: detail.map(str::to_string),
        });
    }

    /// All calls so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of calls to `method`.
    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.method == method).count()
    }

    /// Most recent call.
    pub fn last(&self) -> Option<Call> {
        self.calls.lock().last().cloned()
    }

    /// Total number of calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Whether no call was recorded.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Forget all calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_calls() {
        let journal = CallJournal::new();
        let handle = journal.clone();

        journal.record("execute", Some("SELECT 1"));
        journal.record("commit", None);

        assert_eq!(handle.len(), 2);
        assert_eq!(handle.count("execute"), 1);
        assert_eq!(handle.last().unwrap().method, "commit");

        handle.clear();
        assert!(journal.is_empty());
    }
}
