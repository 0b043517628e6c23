//! Queued output through the line editor's external printer.
//!
//! While a line editor owns the terminal, anything written straight to the
//! tty races with its keystroke echo and repaint. rustyline offers an
//! [`ExternalPrinter`] that hands text to its own event loop, which clears
//! the input line, prints, and repaints in one step.
//!
//! [`QueuedPrinter`] puts a bounded channel and a drain thread in front of
//! it. `ExternalPrinter::print` may block until the editor's loop picks the
//! message up; the coordinator calls [`QueuedPrinter::try_print`] under its
//! write token, so that call must never wait on the editor. Messages leave
//! the queue in the order they were enqueued.

use crate::coordinator::PrintOutcome;
use crate::error::ConsoleError;
use parking_lot::Mutex;
use rustyline::error::ReadlineError;
use rustyline::ExternalPrinter;
use std::io;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;

/// Boxed editor printer as handed over by a [`LineReader`](crate::LineReader).
pub type EditorPrinter = Box<dyn ExternalPrinter + Send>;

/// Non-blocking front for an [`ExternalPrinter`].
pub(crate) struct QueuedPrinter {
    tx: SyncSender<String>,
    /// First failure seen by the drain thread.
    failure: Arc<Mutex<Option<io::ErrorKind>>>,
}

impl QueuedPrinter {
    /// Records buffered before new ones are dropped.
    pub(crate) const CHANNEL_CAPACITY: usize = 500;

    /// Starts the drain thread for `printer`.
    pub(crate) fn new(mut printer: EditorPrinter) -> Result<Self, ConsoleError> {
        let (tx, rx) = mpsc::sync_channel::<String>(Self::CHANNEL_CAPACITY);
        let failure = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&failure);

        std::thread::Builder::new()
            .name("termconsole-printer".into())
            .spawn(move || {
                while let Ok(msg) = rx.recv() {
                    if let Err(e) = printer.print(msg) {
                        *seen.lock() = Some(error_kind(&e));
                        break;
                    }
                }
            })
            .map_err(|e| ConsoleError::spawn("printer", e))?;

        Ok(Self { tx, failure })
    }

    /// Enqueues `msg` without blocking.
    ///
    /// Returns [`PrintOutcome::Discarded`] when the queue is full and
    /// [`PrintOutcome::Failed`] once the editor printer has failed.
    pub(crate) fn try_print(&self, msg: String) -> PrintOutcome {
        if let Some(kind) = *self.failure.lock() {
            return PrintOutcome::Failed(kind);
        }
        match self.tx.try_send(msg) {
            Ok(()) => PrintOutcome::Written,
            Err(TrySendError::Full(_)) => PrintOutcome::Discarded,
            Err(TrySendError::Disconnected(_)) => {
                let kind = self.failure.lock().unwrap_or(io::ErrorKind::BrokenPipe);
                PrintOutcome::Failed(kind)
            }
        }
    }
}

fn error_kind(err: &ReadlineError) -> io::ErrorKind {
    match err {
        ReadlineError::Io(e) => e.kind(),
        _ => io::ErrorKind::Other,
    }
}
