//! Command dispatch loop.
//!
//! Owns the one thread that reads input. Each completed line is handed to
//! the registered [`CommandHandler`] on that same thread, one at a time
//! and in order.
//!
//! # State machine
//!
//! ```text
//! NotStarted ──start()──▶ Running ──EOF / cancel / Ctrl+C / sink lost──▶ Stopping ──▶ Stopped
//!                            │                                              ▲
//!                            └──────────────── shutdown() ──────────────────┘
//! ```
//!
//! Handlers end the session by calling
//! [`Coordinator::shutdown`](crate::Coordinator::shutdown); the next read
//! then returns `Cancelled` and the loop stops.

use crate::config::{ConsoleConfig, InterruptPolicy};
use crate::coordinator::Coordinator;
use crate::error::ConsoleError;
use crate::reader::ReadOutcome;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Application callback invoked once per completed, non-empty line.
///
/// Errors and panics are reported through tracing; they never end the loop.
pub trait CommandHandler: Send {
    /// Handles one line, already trimmed.
    ///
    /// # Errors
    ///
    /// Any error is logged and the loop continues with the next line.
    fn handle(&mut self, line: &str) -> anyhow::Result<()>;
}

impl<F> CommandHandler for F
where
    F: FnMut(&str) -> anyhow::Result<()> + Send,
{
    fn handle(&mut self, line: &str) -> anyhow::Result<()> {
        self(line)
    }
}

/// Lifecycle of a [`CommandLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Created, [`CommandLoop::start`] not yet called.
    NotStarted,
    /// Reading and dispatching lines.
    Running,
    /// Tearing down the console.
    Stopping,
    /// Finished. Terminal.
    Stopped,
}

/// Loop policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOptions {
    /// What Ctrl+C at the prompt does.
    pub interrupt: InterruptPolicy,
    /// Stop once the coordinator reports the sink as lost.
    pub stop_on_sink_loss: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            interrupt: InterruptPolicy::Stop,
            stop_on_sink_loss: true,
        }
    }
}

impl LoopOptions {
    #[must_use]
    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self {
            interrupt: config.interrupt,
            stop_on_sink_loss: config.stop_on_sink_loss,
        }
    }
}

/// Reads lines through a [`Coordinator`] and dispatches them.
pub struct CommandLoop {
    console: Arc<Coordinator>,
    state: Arc<Mutex<LoopState>>,
    handler: Mutex<Option<Box<dyn CommandHandler>>>,
    options: LoopOptions,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for CommandLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandLoop")
            .field("state", &self.state())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CommandLoop {
    /// Creates a loop over `console` with the given handler.
    pub fn new(
        console: Arc<Coordinator>,
        handler: impl CommandHandler + 'static,
        options: LoopOptions,
    ) -> Self {
        Self {
            console,
            state: Arc::new(Mutex::new(LoopState::NotStarted)),
            handler: Mutex::new(Some(Box::new(handler))),
            options,
            thread: Mutex::new(None),
        }
    }

    /// Spawns the dispatch thread.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::AlreadyStarted`] on a second call (or after
    /// [`shutdown`](Self::shutdown)), and [`ConsoleError::Spawn`] if the
    /// thread cannot be created.
    pub fn start(&self) -> Result<(), ConsoleError> {
        {
            let mut state = self.state.lock();
            if *state != LoopState::NotStarted {
                return Err(ConsoleError::AlreadyStarted);
            }
            *state = LoopState::Running;
        }
        let Some(mut handler) = self.handler.lock().take() else {
            return Err(ConsoleError::AlreadyStarted);
        };

        let console = Arc::clone(&self.console);
        let state = Arc::clone(&self.state);
        let options = self.options;

        let spawned = thread::Builder::new()
            .name("termconsole-dispatch".into())
            .spawn(move || {
                run(&console, handler.as_mut(), options);
                *state.lock() = LoopState::Stopping;
                console.shutdown();
                *state.lock() = LoopState::Stopped;
                tracing::debug!("Command loop stopped");
            });

        match spawned {
            Ok(handle) => {
                *self.thread.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = LoopState::Stopped;
                Err(ConsoleError::spawn("dispatch", e))
            }
        }
    }

    /// Returns `true` while the loop is reading and dispatching.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        *self.state.lock()
    }

    /// Stops the loop. Safe from any thread, repeatable.
    ///
    /// Cancels the in-progress read; a handler already running finishes
    /// first. Use [`join`](Self::join) to wait for the thread.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                LoopState::NotStarted => *state = LoopState::Stopped,
                LoopState::Running => *state = LoopState::Stopping,
                LoopState::Stopping | LoopState::Stopped => {}
            }
        }
        self.console.shutdown();
    }

    /// Waits for the dispatch thread to exit. Returns immediately if the
    /// loop was never started or has already been joined.
    pub fn join(&self) {
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Command loop thread panicked");
                *self.state.lock() = LoopState::Stopped;
            }
        }
    }

    /// The coordinator this loop reads from.
    #[must_use]
    pub fn console(&self) -> &Arc<Coordinator> {
        &self.console
    }
}

fn run(console: &Coordinator, handler: &mut dyn CommandHandler, options: LoopOptions) {
    loop {
        if options.stop_on_sink_loss && console.is_sink_lost() {
            tracing::warn!("Terminal output lost, ending session");
            return;
        }

        match console.begin_read() {
            Ok(ReadOutcome::Line(line)) => {
                let line = line.trim();
                if !line.is_empty() {
                    dispatch(handler, line);
                }
            }
            Ok(ReadOutcome::Interrupted) => match options.interrupt {
                InterruptPolicy::Clear => {}
                InterruptPolicy::Stop => {
                    tracing::debug!("Interrupted at prompt");
                    return;
                }
            },
            Ok(ReadOutcome::Eof) => {
                tracing::debug!("End of input");
                return;
            }
            Ok(ReadOutcome::Cancelled) => return,
            Err(e) => {
                tracing::error!("Read failed: {e}");
                return;
            }
        }
    }
}

fn dispatch(handler: &mut dyn CommandHandler, line: &str) {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(line))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(command = line, "Command failed: {e:#}"),
        Err(payload) => tracing::error!(
            command = line,
            "Command panicked: {}",
            panic_message(payload.as_ref())
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
