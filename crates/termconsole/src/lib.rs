//! Interactive console that keeps the prompt intact while background
//! threads log.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   on_log_record   ┌─────────────┐
//! │ tracing      │ ────────────────▶ │ LogBridge   │──┐
//! │ (any thread) │                   └─────────────┘  │ print_above
//! └──────────────┘                                    ▼
//!                                           ┌──────────────────┐   write   ┌──────────────┐
//!                                           │   Coordinator    │ ────────▶ │ TerminalSink │
//!                                           │  (write token)   │           └──────────────┘
//!                                           └──────────────────┘
//!                                              ▲   begin_read │ snapshot
//! ┌──────────────┐   handle(line)   ┌──────────┴───┐          ▼
//! │ CommandHandler│ ◀────────────── │ CommandLoop  │   ┌────────────┐
//! └──────────────┘                  └──────────────┘   │ LineReader │ (reader thread)
//!                                                      └────────────┘
//! ```
//!
//! - [`Coordinator`]: serializes every terminal write and redraws the
//!   prompt plus unsent input around log output.
//! - [`LogBridge`]: the logging integration point; never fails back into
//!   the logging pipeline.
//! - [`CommandLoop`]: reads lines and dispatches them to the handler.
//! - [`TerminalSink`] / [`LineReader`]: the output stream and the line
//!   editor the coordinator is bound to.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use termconsole::{
//!     attach_console, CommandLoop, ConsoleMakeWriter, ConsoleSlot, LogBridge, LoopOptions,
//!     ReaderOptions, RustylineReader, StdoutSink,
//! };
//!
//! # fn main() -> Result<(), termconsole::ConsoleError> {
//! let slot = ConsoleSlot::new();
//! let bridge = Arc::new(LogBridge::new(slot.clone()));
//! tracing_subscriber::fmt()
//!     .with_writer(ConsoleMakeWriter::new(bridge))
//!     .init();
//!
//! let console = attach_console(StdoutSink::new(), |pending| {
//!     RustylineReader::new(pending, ReaderOptions::default())
//! })?;
//! slot.set(Arc::clone(&console));
//!
//! let command_loop = CommandLoop::new(
//!     console,
//!     |line: &str| -> anyhow::Result<()> {
//!         tracing::info!("you typed {line}");
//!         Ok(())
//!     },
//!     LoopOptions::default(),
//! );
//! command_loop.start()?;
//! command_loop.join();
//! slot.clear();
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod coordinator;
pub mod dispatch;
mod error;
pub mod format;
mod printer;
pub mod reader;
pub mod sink;
pub mod testing;
mod tty;

pub use bridge::{ConsoleMakeWriter, ConsoleSlot, ConsoleWriter, LogBridge};
pub use coordinator::{
    ansi_enabled, attach_console, ConsoleOptions, Coordinator, PrintOutcome, ReaderState,
    TerminalMode,
};
pub use dispatch::{CommandHandler, CommandLoop, LoopOptions, LoopState};
pub use error::{ConsoleError, ErrorCode};
pub use printer::EditorPrinter;
pub use reader::{
    LineReader, PendingLine, PendingLineHandle, ReadOutcome, ReaderOptions, RustylineReader,
};
pub use sink::{StdoutSink, TerminalSink};
