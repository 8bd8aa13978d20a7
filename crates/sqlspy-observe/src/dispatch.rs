//! Listener contract and event dispatch.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::event::SqlEvent;

/// Errors a listener may report while handling an event.
///
/// They never reach the caller of the instrumented statement; the dispatcher
/// logs and discards them.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Writing the event to a sink failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the event failed.
    #[error("Format error: {0}")]
    Format(#[from] serde_json::Error),

    /// The listener refused the event.
    #[error("Listener rejected event: {0}")]
    Rejected(String),
}

/// Result type for listener callbacks.
pub type ListenerResult = std::result::Result<(), ListenerError>;

/// Consumer of SQL events.
///
/// Called synchronously on the thread that ran the statement, once per
/// execution call, after the call completed. A slow listener stalls that
/// caller.
///
/// Errors and panics are contained by [`EventDispatcher::dispatch`] and never
/// reach the caller. A panic still runs the process panic hook first, so the
/// default hook prints its message to stderr (with a backtrace when
/// `RUST_BACKTRACE` is set) on every event. Return an error instead of
/// panicking.
pub trait SqlListener: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &SqlEvent<'_>) -> ListenerResult;

    /// Name used when logging this listener's failures.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A listener shared between interceptors.
pub type SharedListener = Arc<dyn SqlListener>;

/// Delivers events to a fixed list of listeners.
///
/// The list is captured once at construction and never changes, so clones
/// can be read from several interceptors without synchronization.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<[SharedListener]>,
}

impl EventDispatcher {
    /// Create a dispatcher over `listeners`, kept in the given order.
    pub fn new(listeners: impl IntoIterator<Item = SharedListener>) -> Self {
        Self {
            listeners: listeners.into_iter().collect(),
        }
    }

    /// A dispatcher with no listeners.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// The registered listeners, in delivery order.
    pub fn listeners(&self) -> &[SharedListener] {
        &self.listeners
    }

    /// Deliver `event` to every listener in registration order.
    ///
    /// A listener that returns an error or panics is skipped; the remaining
    /// listeners still receive the event and nothing is reported back.
    pub fn dispatch(&self, event: &SqlEvent<'_>) {
        for (index, listener) in self.listeners.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    debug!(
                        listener = listener.name(),
                        index,
                        error = %error,
                        "Listener failed, event discarded for it"
                    );
                }
                Err(payload) => {
                    warn!(
                        listener = listener.name(),
                        index,
                        panic = panic_message(payload.as_ref()),
                        "Listener panicked, event discarded for it"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

impl FromIterator<SharedListener> for EventDispatcher {
    fn from_iter<I: IntoIterator<Item = SharedListener>>(iter: I) -> Self {
        Self::new(iter)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::CollectingListener;

    struct Failing;

    impl SqlListener for Failing {
        fn on_event(&self, _event: &SqlEvent<'_>) -> ListenerResult {
            Err(ListenerError::Rejected("always".to_string()))
        }
    }

    struct Panicking;

    impl SqlListener for Panicking {
        fn on_event(&self, _event: &SqlEvent<'_>) -> ListenerResult {
            panic!("listener exploded");
        }
    }

    #[test]
    fn test_empty_dispatcher() {
        let dispatcher = EventDispatcher::empty();
        assert!(dispatcher.is_empty());
        dispatcher.dispatch(&SqlEvent::builder(Some("SELECT 1")).build());
    }

    #[test]
    fn test_dispatch_reaches_every_listener() {
        let first = Arc::new(CollectingListener::new(10));
        let second = Arc::new(CollectingListener::new(10));
        let dispatcher = EventDispatcher::new([
            Arc::clone(&first) as SharedListener,
            Arc::clone(&second) as SharedListener,
        ]);

        dispatcher.dispatch(&SqlEvent::builder(Some("SELECT 1")).build());

        assert_eq!(dispatcher.listener_count(), 2);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        let collector = Arc::new(CollectingListener::new(10));
        let dispatcher = EventDispatcher::new([
            Arc::new(Failing) as SharedListener,
            Arc::new(Panicking) as SharedListener,
            Arc::clone(&collector) as SharedListener,
        ]);

        for _ in 0..3 {
            dispatcher.dispatch(&SqlEvent::builder(Some("SELECT 1")).build());
        }

        assert_eq!(collector.len(), 3);
    }

    #[test]
    fn test_registration_order_is_kept() {
        struct Tagging(&'static str, Arc<parking_lot::Mutex<Vec<&'static str>>>);

        impl SqlListener for Tagging {
            fn on_event(&self, _event: &SqlEvent<'_>) -> ListenerResult {
                self.1.lock().push(self.0);
                Ok(())
            }
        }

        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let dispatcher: EventDispatcher = ["a", "b", "c"]
            .into_iter()
            .map(|tag| Arc::new(Tagging(tag, Arc::clone(&order))) as SharedListener)
            .collect();

        dispatcher.dispatch(&SqlEvent::builder(None).build());

        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_clones_share_listeners() {
        let collector = Arc::new(CollectingListener::new(10));
        let dispatcher = EventDispatcher::new([Arc::clone(&collector) as SharedListener]);
        let clone = dispatcher.clone();

        dispatcher.dispatch(&SqlEvent::builder(None).build());
        clone.dispatch(&SqlEvent::builder(None).build());

        assert_eq!(collector.len(), 2);
    }
}
