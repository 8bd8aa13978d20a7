//! p6spy-style console listener.

use std::io::{self, Stdout, Write};

use chrono::Local;
use parking_lot::Mutex;

use crate::dispatch::{ListenerResult, SqlListener};
use crate::event::SqlEvent;

const RED: &str = "\u{1b}[31m";
const RESET: &str = "\u{1b}[0m";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Prints each event as a short block in the familiar p6spy layout:
///
/// ```text
///  Consume Time: 12 ms 2024-12-10 20:00:00.123
///  Execute SQL: select * from user where id = 1
/// ```
///
/// Failed statements get an extra ` Error: ...` line. Runs of whitespace in
/// the SQL are collapsed so every statement fits on one line, and events with
/// blank SQL are skipped.
pub struct ConsoleListener<W = Stdout> {
    out: Mutex<W>,
    color: bool,
}

impl ConsoleListener<Stdout> {
    /// Print to standard output, in red.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for ConsoleListener<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsoleListener<W> {
    /// Print to `out`.
    pub fn with_writer(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            color: true,
        }
    }

    /// Enable or disable the ANSI colour wrapper.
    pub fn with_color(mut self, enabled: bool) -> Self {
        self.color = enabled;
        self
    }

    /// Consume the listener and return its writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    /// Render `event` the way it is printed, without colour.
    ///
    /// Returns `None` for events with blank SQL.
    pub fn render(event: &SqlEvent<'_>) -> Option<String> {
        let sql = event.sql();
        if sql.trim().is_empty() {
            return None;
        }

        let started = event
            .started_at()
            .with_timezone(&Local)
            .format(TIME_FORMAT);
        let mut block = format!(
            " Consume Time: {} ms {}\n Execute SQL: {}",
            event.elapsed_ms(),
            started,
            collapse_whitespace(sql)
        );
        if !event.is_success() {
            if let Some(error) = event.error() {
                block.push_str("\n Error: ");
                block.push_str(&error.to_string());
            }
        }
        Some(block)
    }
}

impl<W: Write + Send> SqlListener for ConsoleListener<W> {
    fn on_event(&self, event: &SqlEvent<'_>) -> ListenerResult {
        let Some(block) = Self::render(event) else {
            return Ok(());
        };

        let mut out = self.out.lock();
        if self.color {
            writeln!(out, "{RED}{block}{RESET}")?;
        } else {
            writeln!(out, "{block}")?;
        }
        out.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

impl<W> std::fmt::Debug for ConsoleListener<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleListener")
            .field("color", &self.color)
            .finish()
    }
}

fn collapse_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::time::Duration;

    use super::*;

    #[derive(Debug)]
    struct Timeout;

    impl fmt::Display for Timeout {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "lock wait timeout")
        }
    }

    impl std::error::Error for Timeout {}

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_render_success() {
        let event = SqlEvent::builder(Some("SELECT *\n  FROM users\tWHERE id = 1"))
            .elapsed(Duration::from_millis(12))
            .build();

        let text = ConsoleListener::<Vec<u8>>::render(&event).unwrap();
        assert!(text.starts_with(" Consume Time: 12 ms "));
        assert!(text.ends_with(" Execute SQL: SELECT * FROM users WHERE id = 1"));
        assert!(!text.contains("Error"));
    }

    #[test]
    fn test_render_failure() {
        let timeout = Timeout;
        let event = SqlEvent::builder(Some("UPDATE t SET a = 1"))
            .error(Some(&timeout))
            .build();

        let text = ConsoleListener::<Vec<u8>>::render(&event).unwrap();
        assert!(text.ends_with("\n Error: lock wait timeout"));
    }

    #[test]
    fn test_blank_sql_is_skipped() {
        let listener = ConsoleListener::with_writer(Vec::new());
        listener
            .on_event(&SqlEvent::builder(Some("   ")).build())
            .unwrap();

        assert!(listener.into_inner().is_empty());
    }

    #[test]
    fn test_color_wrapper() {
        let listener = ConsoleListener::with_writer(Vec::new());
        listener
            .on_event(&SqlEvent::builder(Some("SELECT 1")).build())
            .unwrap();

        let written = String::from_utf8(listener.into_inner()).unwrap();
        assert!(written.starts_with(RED));
        assert!(written.ends_with(&format!("{RESET}\n")));
    }

    #[test]
    fn test_plain_output() {
        let listener = ConsoleListener::with_writer(Vec::new()).with_color(false);
        listener
            .on_event(&SqlEvent::builder(Some("SELECT 1")).build())
            .unwrap();

        let written = String::from_utf8(listener.into_inner()).unwrap();
        assert!(written.starts_with(" Consume Time: "));
        assert!(!written.contains('\u{1b}'));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let listener = ConsoleListener::with_writer(BrokenPipe);
        let result = listener.on_event(&SqlEvent::builder(Some("SELECT 1")).build());
        assert!(matches!(result, Err(crate::ListenerError::Io(_))));
    }
}
