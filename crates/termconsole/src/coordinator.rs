//! Console coordinator.
//!
//! The [`Coordinator`] is the single owner of the terminal. Every byte that
//! reaches the [`TerminalSink`] passes through one lock (the write token),
//! held for exactly one write sequence:
//!
//! ```text
//! print_above("WARN: disk full\n")        screen
//! ────────────────────────────────        ──────────────────────
//!   lock write token                      > he█
//!   erase prompt + input       ──▶        █
//!   write payload              ──▶        WARN: disk full
//!   redraw prompt + snapshot   ──▶        > he█
//!   unlock
//! ```
//!
//! When the line editor renders its own input line (rustyline on a real
//! terminal), it hands over an editor printer at attach time. Interactive
//! payloads then go through that printer instead, still under the write
//! token, and the editor clears, prints and repaints inside its own event
//! loop so keystroke echo can never land inside a log line. The
//! erase/redraw sequence above is the path for readers without one.
//!
//! The blocking read runs on a dedicated reader thread. [`Coordinator::begin_read`]
//! hands it a prompt and waits on a channel for the outcome; the write
//! token is never held across the read, so producers are never stuck
//! behind a user who stopped typing.
//!
//! Nothing in this module emits tracing events while the write token is
//! held. A subscriber routed back into [`Coordinator::print_above`] would
//! otherwise deadlock on the token.

use crate::config::{AnsiMode, ConsoleConfig};
use crate::error::ConsoleError;
use crate::printer::{EditorPrinter, QueuedPrinter};
use crate::reader::{LineReader, PendingLine, PendingLineHandle, ReadOutcome};
use crate::sink::TerminalSink;
use parking_lot::Mutex;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

/// Output mode, detected once at attach time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    /// Cursor movement and line erase are available; the prompt is
    /// redrawn around log output.
    Interactive,
    /// Straight serialized writes, no escape sequences.
    Plain,
}

impl TerminalMode {
    /// Detects the mode of `sink`. `force_plain` wins over an interactive sink.
    pub fn detect<S: TerminalSink + ?Sized>(sink: &S, force_plain: bool) -> Self {
        if force_plain || !sink.is_interactive() {
            Self::Plain
        } else {
            Self::Interactive
        }
    }
}

/// Resolves an ANSI policy against a detected mode.
#[must_use]
pub fn ansi_enabled(policy: AnsiMode, mode: TerminalMode) -> bool {
    match policy {
        AnsiMode::Always => true,
        AnsiMode::Never => false,
        AnsiMode::Auto => mode == TerminalMode::Interactive,
    }
}

/// Lifecycle of the console's input side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// No read in progress.
    Idle,
    /// A [`Coordinator::begin_read`] call is blocked on user input.
    AwaitingInput,
    /// Shut down. Terminal state.
    Closed,
}

/// Result of a best-effort write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOutcome {
    /// The whole sequence reached the sink.
    Written,
    /// Dropped without touching the sink (console closed or sink lost).
    Discarded,
    /// The sink rejected the write. The payload is dropped, not retried.
    Failed(io::ErrorKind),
}

impl PrintOutcome {
    /// Returns `true` for [`PrintOutcome::Written`].
    #[must_use]
    pub fn is_written(self) -> bool {
        self == Self::Written
    }
}

/// Attach-time settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleOptions {
    /// Initial prompt.
    pub prompt: String,
    /// Force [`TerminalMode::Plain`] even on an interactive sink.
    pub force_plain: bool,
    /// ANSI escape policy reported by [`Coordinator::ansi_supported`].
    pub ansi: AnsiMode,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            prompt: "> ".into(),
            force_plain: false,
            ansi: AnsiMode::Auto,
        }
    }
}

impl ConsoleOptions {
    /// Builds options from the `[console]` config section.
    #[must_use]
    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self {
            prompt: config.prompt.clone(),
            force_plain: !config.terminal,
            ansi: config.ansi,
        }
    }

    /// Sets the prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Forces plain output.
    #[must_use]
    pub fn plain(mut self) -> Self {
        self.force_plain = true;
        self
    }
}

type ReadResult = Result<ReadOutcome, ConsoleError>;

/// State guarded by the write token.
struct Output {
    sink: Box<dyn TerminalSink>,
    /// Editor printer, only kept in interactive mode.
    printer: Option<QueuedPrinter>,
    mode: TerminalMode,
    state: ReaderState,
    lost: bool,
}

impl Output {
    /// Single downgrade, then give up on the sink.
    fn record_failure(&mut self) {
        match self.mode {
            TerminalMode::Interactive => {
                self.mode = TerminalMode::Plain;
                self.printer = None;
            }
            TerminalMode::Plain => self.lost = true,
        }
    }

    /// Snapshot to redraw around a write, if a prompt is on screen.
    fn visible_prompt(&self, pending: &PendingLineHandle) -> Option<PendingLine> {
        if self.mode == TerminalMode::Interactive && self.state == ReaderState::AwaitingInput {
            pending.snapshot()
        } else {
            None
        }
    }

    fn write(&mut self, bytes: &[u8]) -> PrintOutcome {
        match self.sink.write(bytes) {
            Ok(()) => PrintOutcome::Written,
            Err(e) => {
                self.record_failure();
                PrintOutcome::Failed(e.kind())
            }
        }
    }
}

/// Serializes terminal output and keeps the prompt intact around it.
///
/// Created by [`attach_console`] / [`Coordinator::attach`] and shared as
/// `Arc<Coordinator>` between the dispatch loop and log producers.
pub struct Coordinator {
    /// The write token.
    output: Mutex<Output>,
    pending: PendingLineHandle,
    prompt: Mutex<String>,
    detected: TerminalMode,
    ansi: AnsiMode,
    /// Prompts for the reader thread. Dropped on shutdown.
    requests: Mutex<Option<Sender<String>>>,
    /// Clone of the reader thread's sender, used to inject `Cancelled`.
    cancel: Mutex<Option<Sender<ReadResult>>>,
    events: Mutex<Receiver<ReadResult>>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("detected", &self.detected)
            .field("ansi", &self.ansi)
            .field("state", &self.reader_state())
            .finish_non_exhaustive()
    }
}

/// Binds a coordinator to `sink` and a reader built by `make_reader`,
/// using default [`ConsoleOptions`].
///
/// # Errors
///
/// See [`Coordinator::attach`].
pub fn attach_console<S, R, F>(sink: S, make_reader: F) -> Result<Arc<Coordinator>, ConsoleError>
where
    S: TerminalSink + 'static,
    R: LineReader + 'static,
    F: FnOnce(PendingLineHandle) -> Result<R, ConsoleError> + Send + 'static,
{
    Coordinator::attach(sink, make_reader, ConsoleOptions::default())
}

impl Coordinator {
    /// Binds a coordinator to a sink and a line reader.
    ///
    /// `make_reader` runs on the new reader thread and receives the handle
    /// it must publish [`PendingLine`] snapshots into. This call blocks
    /// until the reader is constructed. The terminal mode is detected here
    /// and never re-detected.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Spawn`] if the reader or printer thread
    /// cannot be started, or the factory's own error if the reader fails
    /// to build.
    pub fn attach<S, R, F>(
        mut sink: S,
        make_reader: F,
        options: ConsoleOptions,
    ) -> Result<Arc<Self>, ConsoleError>
    where
        S: TerminalSink + 'static,
        R: LineReader + 'static,
        F: FnOnce(PendingLineHandle) -> Result<R, ConsoleError> + Send + 'static,
    {
        let detected = TerminalMode::detect(&sink, options.force_plain);
        sink.save_terminal();

        let pending = PendingLineHandle::new();
        let (request_tx, request_rx) = mpsc::channel::<String>();
        let (event_tx, event_rx) = mpsc::channel::<ReadResult>();

        let editor_printer =
            spawn_reader(make_reader, pending.clone(), request_rx, event_tx.clone())?;
        let printer = match editor_printer {
            Some(printer) if detected == TerminalMode::Interactive => {
                Some(QueuedPrinter::new(printer)?)
            }
            _ => None,
        };

        tracing::debug!(
            mode = ?detected,
            ansi = ?options.ansi,
            editor_printer = printer.is_some(),
            "Console attached"
        );

        Ok(Arc::new(Self {
            output: Mutex::new(Output {
                sink: Box::new(sink),
                printer,
                mode: detected,
                state: ReaderState::Idle,
                lost: false,
            }),
            pending,
            prompt: Mutex::new(options.prompt),
            detected,
            ansi: options.ansi,
            requests: Mutex::new(Some(request_tx)),
            cancel: Mutex::new(Some(event_tx)),
            events: Mutex::new(event_rx),
        }))
    }

    /// Writes `text` above the prompt.
    ///
    /// Callable from any thread. Blocks only behind other writers, never
    /// behind the pending read. With a prompt on screen the payload is
    /// terminated with a newline if it lacks one; otherwise it is written
    /// verbatim.
    ///
    /// With an editor printer the payload is queued to the editor instead
    /// and [`PrintOutcome::Discarded`] means the queue was full.
    pub fn print_above(&self, text: &str) -> PrintOutcome {
        let mut out = self.output.lock();
        if out.state == ReaderState::Closed || out.lost {
            return PrintOutcome::Discarded;
        }

        let queued = out
            .printer
            .as_ref()
            .map(|printer| printer.try_print(text.to_owned()));
        if let Some(outcome) = queued {
            if matches!(outcome, PrintOutcome::Failed(_)) {
                out.record_failure();
            }
            return outcome;
        }

        match out.visible_prompt(&self.pending) {
            Some(line) => {
                let width = out.sink.width();
                let mut seq = line.erase(width);
                seq.push_str(text);
                if !text.ends_with('\n') {
                    seq.push('\n');
                }
                seq.push_str(&line.redraw(width));
                out.write(seq.as_bytes())
            }
            None => out.write(text.as_bytes()),
        }
    }

    /// Writes several lines as one sequence, each terminated by a newline.
    pub fn print_lines<I, S>(&self, lines: I) -> PrintOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        for line in lines {
            text.push_str(line.as_ref());
            text.push('\n');
        }
        if text.is_empty() {
            return PrintOutcome::Written;
        }
        self.print_above(&text)
    }

    /// Erases and redraws the prompt from the latest snapshot.
    ///
    /// A no-op unless a read is in progress on an interactive sink, or
    /// when the editor repaints its own line.
    pub fn refresh_prompt(&self) -> PrintOutcome {
        let mut out = self.output.lock();
        if out.state == ReaderState::Closed || out.lost {
            return PrintOutcome::Discarded;
        }
        if out.printer.is_some() {
            return PrintOutcome::Written;
        }
        match out.visible_prompt(&self.pending) {
            Some(line) => {
                let width = out.sink.width();
                let mut seq = line.erase(width);
                seq.push_str(&line.redraw(width));
                out.write(seq.as_bytes())
            }
            None => PrintOutcome::Written,
        }
    }

    /// Blocks until the user completes a line, ends input, interrupts,
    /// or the console is shut down.
    ///
    /// This is the only operation that may block indefinitely. After
    /// [`shutdown`](Self::shutdown) it returns [`ReadOutcome::Cancelled`]
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Reader`] if the line editor fails or a read
    /// is already in progress on another thread.
    pub fn begin_read(&self) -> Result<ReadOutcome, ConsoleError> {
        {
            let mut out = self.output.lock();
            match out.state {
                ReaderState::Closed => return Ok(ReadOutcome::Cancelled),
                ReaderState::AwaitingInput => {
                    return Err(ConsoleError::reader("a read is already in progress"));
                }
                ReaderState::Idle => out.state = ReaderState::AwaitingInput,
            }
        }

        let prompt = self.prompt();
        let sent = self
            .requests
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(prompt).is_ok());

        let result = if sent {
            let events = self.events.lock();
            events.recv().unwrap_or(Ok(ReadOutcome::Cancelled))
        } else {
            Ok(ReadOutcome::Cancelled)
        };

        let mut out = self.output.lock();
        if out.state == ReaderState::Closed {
            // A line that raced with shutdown is still delivered; anything
            // else becomes a cancellation.
            return match result {
                Ok(ReadOutcome::Line(line)) => Ok(ReadOutcome::Line(line)),
                _ => Ok(ReadOutcome::Cancelled),
            };
        }
        out.state = ReaderState::Idle;
        result
    }

    /// Closes the console.
    ///
    /// Unblocks any in-progress [`begin_read`](Self::begin_read) with
    /// [`ReadOutcome::Cancelled`] and makes later writes return
    /// [`PrintOutcome::Discarded`]. Safe from any thread; repeated calls
    /// are no-ops.
    ///
    /// The terminal mode saved at attach is restored, since the reader
    /// thread may still be blocked inside the editor with the terminal in
    /// raw mode when the process exits.
    pub fn shutdown(&self) {
        let restored = {
            let mut out = self.output.lock();
            if out.state == ReaderState::Closed {
                return;
            }
            out.printer = None;
            let restored = out.sink.restore_terminal();
            // Leave the cursor below an abandoned prompt.
            if out.visible_prompt(&self.pending).is_some() && !out.lost {
                out.write(b"\n");
            }
            out.state = ReaderState::Closed;
            restored
        };
        if let Err(e) = restored {
            tracing::warn!("Cannot restore terminal mode: {e}");
        }

        // The reader thread exits after its current read.
        self.requests.lock().take();
        if let Some(cancel) = self.cancel.lock().take() {
            let _ = cancel.send(Ok(ReadOutcome::Cancelled));
        }

        tracing::debug!("Console shut down");
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.reader_state() == ReaderState::Closed
    }

    /// Current reader state.
    #[must_use]
    pub fn reader_state(&self) -> ReaderState {
        self.output.lock().state
    }

    /// Current output mode. Starts at the detected mode and may be
    /// downgraded to [`TerminalMode::Plain`] after a sink failure.
    #[must_use]
    pub fn mode(&self) -> TerminalMode {
        self.output.lock().mode
    }

    /// Mode detected at attach time.
    #[must_use]
    pub fn detected_mode(&self) -> TerminalMode {
        self.detected
    }

    /// Returns `true` if the sink failed in plain mode and writes are
    /// being dropped.
    #[must_use]
    pub fn is_sink_lost(&self) -> bool {
        self.output.lock().lost
    }

    /// Whether ANSI escape sequences should be emitted into log output.
    #[must_use]
    pub fn ansi_supported(&self) -> bool {
        ansi_enabled(self.ansi, self.detected)
    }

    /// Latest snapshot of the unsent input, if a prompt is on screen.
    #[must_use]
    pub fn pending_line(&self) -> Option<PendingLine> {
        self.pending.snapshot()
    }

    /// Prompt used by the next read.
    #[must_use]
    pub fn prompt(&self) -> String {
        self.prompt.lock().clone()
    }

    /// Changes the prompt. Takes effect on the next read.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        *self.prompt.lock() = prompt.into();
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Starts the reader thread and waits for the reader to be built.
///
/// Returns the reader's editor printer, created on the reader thread.
fn spawn_reader<R, F>(
    make_reader: F,
    pending: PendingLineHandle,
    requests: Receiver<String>,
    events: Sender<ReadResult>,
) -> Result<Option<EditorPrinter>, ConsoleError>
where
    R: LineReader + 'static,
    F: FnOnce(PendingLineHandle) -> Result<R, ConsoleError> + Send + 'static,
{
    let (init_tx, init_rx) = mpsc::sync_channel::<Result<Option<EditorPrinter>, _>>(1);

    let handle = thread::Builder::new()
        .name("termconsole-reader".into())
        .spawn(move || {
            let mut reader = match make_reader(pending.clone()) {
                Ok(mut reader) => {
                    let printer = reader.external_printer();
                    let _ = init_tx.send(Ok(printer));
                    reader
                }
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };

            while let Ok(prompt) = requests.recv() {
                let result = panic::catch_unwind(AssertUnwindSafe(|| reader.read_line(&prompt)));
                // Readers clear on accept; this covers every other outcome.
                pending.clear();

                let (result, poisoned) = match result {
                    Ok(result) => (result, false),
                    Err(_) => (Err(ConsoleError::reader("line reader panicked")), true),
                };
                if events.send(result).is_err() || poisoned {
                    break;
                }
            }
        })
        .map_err(|e| ConsoleError::spawn("reader", e))?;

    match init_rx.recv() {
        Ok(Ok(printer)) => Ok(printer),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => Err(ConsoleError::reader(
            "reader thread exited during initialization",
        )),
    }
}
