//! In-memory test doubles for the terminal sink and the line reader.
//!
//! ```
//! use termconsole::testing::{scripted_reader, CaptureSink};
//! use termconsole::{attach_console, ReadOutcome};
//!
//! let sink = CaptureSink::plain();
//! let (input, make_reader) = scripted_reader();
//! let console = attach_console(sink.clone(), make_reader).unwrap();
//!
//! input.send_line("ping");
//! assert_eq!(console.begin_read().unwrap(), ReadOutcome::Line("ping".into()));
//!
//! console.print_above("pong\n");
//! assert_eq!(sink.contents(), "pong\n");
//! ```

use crate::error::ConsoleError;
use crate::printer::EditorPrinter;
use crate::reader::{LineReader, PendingLine, PendingLineHandle, ReadOutcome};
use crate::sink::{TerminalSink, DEFAULT_WIDTH};
use parking_lot::Mutex;
use rustyline::error::ReadlineError;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sink that records every write.
///
/// Clones share the same buffer, so a test keeps one clone and hands the
/// other to the coordinator.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    failures: Arc<AtomicUsize>,
    restores: Arc<AtomicUsize>,
    interactive: bool,
    width: usize,
}

impl CaptureSink {
    fn new(interactive: bool) -> Self {
        Self {
            writes: Arc::default(),
            failures: Arc::default(),
            restores: Arc::default(),
            interactive,
            width: DEFAULT_WIDTH,
        }
    }

    /// A sink that reports itself as a TTY.
    #[must_use]
    pub fn interactive() -> Self {
        Self::new(true)
    }

    /// A sink that reports itself as a pipe.
    #[must_use]
    pub fn plain() -> Self {
        Self::new(false)
    }

    /// Sets the reported terminal width.
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Makes the next `n` writes fail with `BrokenPipe`.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Makes every following write fail.
    pub fn fail_always(&self) {
        self.fail_next(usize::MAX);
    }

    /// Every successful write call, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    /// All bytes written so far.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.writes.lock().concat()
    }

    /// All bytes written so far, lossily decoded.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    /// Forgets everything written so far.
    pub fn clear(&self) {
        self.writes.lock().clear();
    }

    /// Number of times the terminal mode was restored.
    #[must_use]
    pub fn restore_count(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

impl TerminalSink for CaptureSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if failing {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.writes.lock().push(bytes.to_vec());
        Ok(())
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn width(&self) -> usize {
        self.width
    }

    fn restore_terminal(&mut self) -> io::Result<()> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Editor printer that records every message it is given.
///
/// Stands in for rustyline's external printer; clones share the record.
#[derive(Debug, Clone, Default)]
pub struct CapturePrinter {
    messages: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
}

impl CapturePrinter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following print fail.
    pub fn fail_always(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Messages printed so far, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl rustyline::ExternalPrinter for CapturePrinter {
    fn print(&mut self, msg: String) -> rustyline::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReadlineError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        self.messages.lock().push(msg);
        Ok(())
    }
}

#[derive(Debug)]
enum Script {
    Pending(String, usize),
    Line(String),
    Eof,
    Interrupt,
    Fail(String),
}

/// Feeds a [`ScriptedReader`] from the test thread.
///
/// Dropping every handle ends input (the reader returns `Eof`).
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    tx: Sender<Script>,
}

impl ScriptHandle {
    fn send(&self, script: Script) {
        let _ = self.tx.send(script);
    }

    /// Completes the current read with `line`.
    pub fn send_line(&self, line: impl Into<String>) {
        self.send(Script::Line(line.into()));
    }

    /// Completes the current read with end-of-input.
    pub fn send_eof(&self) {
        self.send(Script::Eof);
    }

    /// Completes the current read with Ctrl+C.
    pub fn send_interrupt(&self) {
        self.send(Script::Interrupt);
    }

    /// Fails the current read with a reader error.
    pub fn send_error(&self, message: impl Into<String>) {
        self.send(Script::Fail(message.into()));
    }

    /// Simulates typing: publishes `buffer` with the cursor at `cursor`.
    pub fn set_pending(&self, buffer: impl Into<String>, cursor: usize) {
        self.send(Script::Pending(buffer.into(), cursor));
    }
}

/// [`LineReader`] driven by a [`ScriptHandle`].
///
/// Publishes an empty [`PendingLine`] when a read starts, as a real
/// editor does once it has drawn the prompt.
#[derive(Debug)]
pub struct ScriptedReader {
    pending: PendingLineHandle,
    rx: Receiver<Script>,
    printer: Option<CapturePrinter>,
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, ConsoleError> {
        self.pending.publish(PendingLine::empty(prompt));
        loop {
            match self.rx.recv() {
                Ok(Script::Pending(buffer, cursor)) => {
                    self.pending
                        .publish(PendingLine::new(prompt, buffer, cursor));
                }
                Ok(Script::Line(line)) => {
                    self.pending.clear();
                    return Ok(ReadOutcome::Line(line));
                }
                Ok(Script::Interrupt) => return Ok(ReadOutcome::Interrupted),
                Ok(Script::Fail(message)) => return Err(ConsoleError::reader(message)),
                Ok(Script::Eof) | Err(_) => return Ok(ReadOutcome::Eof),
            }
        }
    }

    fn external_printer(&mut self) -> Option<EditorPrinter> {
        self.printer
            .take()
            .map(|printer| Box::new(printer) as EditorPrinter)
    }
}

/// Creates a scripted reader factory for
/// [`attach_console`](crate::attach_console) and the handle that drives it.
pub fn scripted_reader() -> (
    ScriptHandle,
    impl FnOnce(PendingLineHandle) -> Result<ScriptedReader, ConsoleError> + Send + 'static,
) {
    scripted(None)
}

/// Like [`scripted_reader`], but the reader hands `printer` to the
/// coordinator as its editor printer, as rustyline does on a terminal.
pub fn scripted_reader_with_printer(
    printer: CapturePrinter,
) -> (
    ScriptHandle,
    impl FnOnce(PendingLineHandle) -> Result<ScriptedReader, ConsoleError> + Send + 'static,
) {
    scripted(Some(printer))
}

fn scripted(
    printer: Option<CapturePrinter>,
) -> (
    ScriptHandle,
    impl FnOnce(PendingLineHandle) -> Result<ScriptedReader, ConsoleError> + Send + 'static,
) {
    let (tx, rx) = mpsc::channel();
    let make = move |pending: PendingLineHandle| -> Result<ScriptedReader, ConsoleError> {
        Ok(ScriptedReader {
            pending,
            rx,
            printer,
        })
    };
    (ScriptHandle { tx }, make)
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}
