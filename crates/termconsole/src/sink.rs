//! Terminal sink: the raw output stream behind the console.
//!
//! The [`Coordinator`](crate::Coordinator) is the only component that
//! writes to a sink. Each `write` call carries one complete write
//! sequence and must reach the stream in one piece.

use crate::tty::SavedMode;
use std::io::{self, IsTerminal, Write};

/// Column count assumed when the terminal size cannot be queried.
pub const DEFAULT_WIDTH: usize = 80;

/// Output stream capability used by the coordinator.
pub trait TerminalSink: Send {
    /// Writes and flushes `bytes` as a single unit.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error (broken pipe, closed stream, ...).
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Returns `true` if the stream is an interactive terminal that
    /// understands cursor movement and line erase.
    fn is_interactive(&self) -> bool;

    /// Returns the terminal width in columns.
    fn width(&self) -> usize;

    /// Remembers the current terminal mode. Called once at attach, before
    /// the line editor touches the terminal.
    fn save_terminal(&mut self) {}

    /// Puts the terminal back into the mode remembered by
    /// [`save_terminal`](Self::save_terminal).
    ///
    /// # Errors
    ///
    /// Returns the OS error if the terminal rejects the mode.
    fn restore_terminal(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink writing to the process's standard output.
///
/// Interactivity is read from the stdout handle. A `TERM=dumb`
/// environment counts as non-interactive. The saved terminal mode is the
/// one of stdin, which is where the line editor switches to raw mode.
#[derive(Debug)]
pub struct StdoutSink {
    out: io::Stdout,
    saved: Option<SavedMode>,
}

impl StdoutSink {
    /// Creates a sink over `std::io::stdout()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            saved: None,
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalSink for StdoutSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut lock = self.out.lock();
        lock.write_all(bytes)?;
        lock.flush()
    }

    fn is_interactive(&self) -> bool {
        self.out.is_terminal() && !is_dumb_terminal(std::env::var("TERM").ok().as_deref())
    }

    fn width(&self) -> usize {
        match crossterm::terminal::size() {
            Ok((cols, _rows)) if cols > 0 => usize::from(cols),
            _ => DEFAULT_WIDTH,
        }
    }

    fn save_terminal(&mut self) {
        self.saved = SavedMode::capture();
    }

    fn restore_terminal(&mut self) -> io::Result<()> {
        match &self.saved {
            Some(mode) => mode.restore(),
            None => Ok(()),
        }
    }
}

/// Returns `true` for terminals that cannot move the cursor.
fn is_dumb_terminal(term: Option<&str>) -> bool {
    matches!(term, Some("dumb"))
}
