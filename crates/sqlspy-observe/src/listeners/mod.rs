//! Built-in listeners.

mod collecting;
mod console;
mod log;

pub use collecting::CollectingListener;
pub use console::ConsoleListener;
pub use log::TracingListener;
