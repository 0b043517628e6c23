//! Line reader adapter.
//!
//! Wraps an interactive line editor behind the [`LineReader`] trait and
//! publishes the in-progress input as [`PendingLine`] snapshots, so the
//! [`Coordinator`](crate::Coordinator) can erase and redraw the prompt
//! around log output without touching the editor's buffer.
//!
//! Editors that repaint their own line hand out an [`EditorPrinter`]
//! instead, and the coordinator prints through it while they own the
//! terminal. [`RustylineReader`] does so whenever stdin and stdout are a
//! terminal.
//!
//! # Threading
//!
//! ```text
//! reader thread                         producer threads
//! ─────────────                         ────────────────
//! LineReader::read_line()  ──publish──▶ PendingLineHandle ──snapshot──▶ Coordinator
//!   (owns and mutates the buffer)         (Arc<Mutex<Option<..>>>)       (read only)
//! ```
//!
//! The editor itself is created on the reader thread (see
//! [`attach_console`](crate::attach_console)), so implementations do not
//! need to be `Send`.

use crate::error::ConsoleError;
use crate::printer::EditorPrinter;
use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::terminal::{Clear, ClearType};
use crossterm::Command;
use parking_lot::Mutex;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Context, Editor, Helper};
use std::path::PathBuf;
use std::sync::Arc;
use unicode_width::UnicodeWidthStr;

/// Result of one blocking read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The user completed a line.
    Line(String),
    /// End of input (Ctrl+D on an empty line, closed stdin).
    Eof,
    /// The user pressed Ctrl+C.
    Interrupted,
    /// The read was cancelled by [`Coordinator::shutdown`](crate::Coordinator::shutdown).
    Cancelled,
}

/// Snapshot of the console's unsent input.
///
/// `cursor` is a byte offset into `buffer` and always sits on a char
/// boundary when produced by a line editor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingLine {
    /// Prompt text shown before the input.
    pub prompt: String,
    /// Characters typed so far.
    pub buffer: String,
    /// Cursor position within `buffer`.
    pub cursor: usize,
}

/// Screen position of the cursor and of the end of the input,
/// relative to the first row of the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    cursor_row: usize,
    cursor_col: usize,
    end_row: usize,
}

impl PendingLine {
    /// Creates a snapshot.
    pub fn new(prompt: impl Into<String>, buffer: impl Into<String>, cursor: usize) -> Self {
        Self {
            prompt: prompt.into(),
            buffer: buffer.into(),
            cursor,
        }
    }

    /// Creates a snapshot of an empty input line.
    pub fn empty(prompt: impl Into<String>) -> Self {
        Self::new(prompt, String::new(), 0)
    }

    fn layout(&self, width: usize) -> Layout {
        let width = width.max(1);
        let prompt = self.prompt.width();
        let before = self
            .buffer
            .get(..self.cursor)
            .unwrap_or(&self.buffer)
            .width();
        let cursor = prompt + before;
        let end = prompt + self.buffer.width();

        Layout {
            cursor_row: cursor / width,
            cursor_col: cursor % width,
            end_row: end / width,
        }
    }

    /// Escape sequence that moves to the start of the prompt and clears
    /// the visible input, assuming the cursor is where this snapshot puts it.
    ///
    /// The buffer itself is untouched; only the screen is cleared.
    #[must_use]
    pub fn erase(&self, width: usize) -> String {
        let layout = self.layout(width);
        let mut seq = String::new();

        if layout.cursor_row > 0 {
            push_ansi(&mut seq, MoveUp(to_u16(layout.cursor_row)));
        }
        seq.push('\r');
        if layout.end_row == 0 {
            push_ansi(&mut seq, Clear(ClearType::CurrentLine));
        } else {
            push_ansi(&mut seq, Clear(ClearType::FromCursorDown));
        }
        seq
    }

    /// Prompt plus input, followed by the cursor movement that puts the
    /// cursor back at `self.cursor`.
    #[must_use]
    pub fn redraw(&self, width: usize) -> String {
        let layout = self.layout(width);
        let mut seq = String::with_capacity(self.prompt.len() + self.buffer.len() + 8);
        seq.push_str(&self.prompt);
        seq.push_str(&self.buffer);

        if self.cursor < self.buffer.len() {
            let up = layout.end_row.saturating_sub(layout.cursor_row);
            if up > 0 {
                push_ansi(&mut seq, MoveUp(to_u16(up)));
            }
            push_ansi(&mut seq, MoveToColumn(to_u16(layout.cursor_col)));
        }
        seq
    }
}

fn push_ansi(seq: &mut String, command: impl Command) {
    // Writing into a String cannot fail.
    let _ = command.write_ansi(seq);
}

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// Shared slot through which a reader publishes its [`PendingLine`].
///
/// `None` means no prompt is on screen (no read in progress, or the
/// editor has not rendered yet).
#[derive(Debug, Clone, Default)]
pub struct PendingLineHandle {
    inner: Arc<Mutex<Option<PendingLine>>>,
}

impl PendingLineHandle {
    /// Creates an empty handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the current input state.
    pub fn publish(&self, line: PendingLine) {
        *self.inner.lock() = Some(line);
    }

    /// Marks the prompt as gone from the screen.
    pub fn clear(&self) {
        *self.inner.lock() = None;
    }

    /// Returns a copy of the most recent snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Option<PendingLine> {
        self.inner.lock().clone()
    }
}

/// Interactive line-reading capability.
///
/// Implementations publish the buffer into the [`PendingLineHandle`]
/// handed to their constructor while a read is in progress, and clear it
/// as soon as a line is accepted.
///
/// A reader that renders its own input line should also hand out an
/// [`EditorPrinter`]. The coordinator then routes interactive output
/// through it and never writes over the editor's line itself.
pub trait LineReader {
    /// Blocks until the user completes a line, ends input or interrupts.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Reader`] if the underlying editor fails.
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, ConsoleError>;

    /// Printer that interleaves output with the editor's own rendering.
    ///
    /// Called once, on the reader thread, right after construction.
    fn external_printer(&mut self) -> Option<EditorPrinter> {
        None
    }
}

/// Settings for [`RustylineReader`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderOptions {
    /// History file; `None` disables persistence.
    pub history_file: Option<PathBuf>,
    /// Maximum number of history entries.
    pub max_history: usize,
    /// Command names offered for completion of the first word.
    pub commands: Vec<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            history_file: None,
            max_history: 1000,
            commands: Vec::new(),
        }
    }
}

impl ReaderOptions {
    /// Builds reader options from the history section of a config.
    #[must_use]
    pub fn from_config(config: &crate::config::TermConsoleConfig) -> Self {
        Self {
            history_file: config
                .history
                .enabled
                .then(|| config.history.file_or_default()),
            max_history: config.history.max_size,
            commands: Vec::new(),
        }
    }

    /// Sets the completion candidates.
    #[must_use]
    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }
}

/// rustyline helper: publishes snapshots on every refresh and completes
/// command names.
struct ConsoleHelper {
    pending: PendingLineHandle,
    prompt: String,
    commands: Vec<String>,
}

impl Hinter for ConsoleHelper {
    type Hint = String;

    // rustyline asks for a hint before every render of the input line,
    // which makes this the one place that sees every buffer change.
    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        self.pending
            .publish(PendingLine::new(self.prompt.clone(), line, pos));
        None
    }
}

impl Completer for ConsoleHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let head = line.get(..pos).unwrap_or(line);
        let (start, matches) = complete_command(&self.commands, head);
        let candidates = matches
            .into_iter()
            .map(|name| Pair {
                display: name.to_string(),
                replacement: name.to_string(),
            })
            .collect();
        Ok((start, candidates))
    }
}

impl Highlighter for ConsoleHelper {}

impl Validator for ConsoleHelper {}

impl Helper for ConsoleHelper {}

/// Completes the first word of `head` against `commands`.
///
/// Returns the byte offset where the replacement starts and the matching
/// names. Nothing is offered once the cursor is past the first word.
fn complete_command<'a>(commands: &'a [String], head: &str) -> (usize, Vec<&'a str>) {
    let word = head.trim_start();
    let start = head.len() - word.len();
    if word.contains(char::is_whitespace) {
        return (head.len(), Vec::new());
    }

    let matches = commands
        .iter()
        .map(String::as_str)
        .filter(|name| name.starts_with(word))
        .collect();
    (start, matches)
}

/// [`LineReader`] backed by rustyline.
///
/// History is loaded on construction and saved after every completed
/// line, so it survives a killed process.
pub struct RustylineReader {
    editor: Editor<ConsoleHelper, DefaultHistory>,
    pending: PendingLineHandle,
    history_file: Option<PathBuf>,
}

impl RustylineReader {
    /// Creates the editor. Must run on the thread that will read.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Reader`] if rustyline cannot be initialized.
    pub fn new(pending: PendingLineHandle, options: ReaderOptions) -> Result<Self, ConsoleError> {
        let config = rustyline::Config::builder()
            .auto_add_history(true)
            .completion_type(CompletionType::List)
            .max_history_size(options.max_history)?
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(ConsoleHelper {
            pending: pending.clone(),
            prompt: String::new(),
            commands: options.commands,
        }));

        if let Some(ref path) = options.history_file {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = editor.load_history(path) {
                tracing::debug!("History load: {e} (expected on first run)");
            }
        }

        Ok(Self {
            editor,
            pending,
            history_file: options.history_file,
        })
    }

    fn save_history(&mut self) {
        if let Some(ref path) = self.history_file {
            if let Err(e) = self.editor.save_history(path) {
                tracing::debug!(path = %path.display(), "History save failed: {e}");
            }
        }
    }
}

impl LineReader for RustylineReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, ConsoleError> {
        if let Some(helper) = self.editor.helper_mut() {
            helper.prompt = prompt.to_owned();
        }

        let result = self.editor.readline(prompt);
        self.pending.clear();

        match result {
            Ok(line) => {
                self.save_history();
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(e) => Err(e.into()),
        }
    }

    fn external_printer(&mut self) -> Option<EditorPrinter> {
        // Fails when stdin or stdout is not a terminal; plain output needs
        // no printer.
        match self.editor.create_external_printer() {
            Ok(printer) => Some(Box::new(printer)),
            Err(e) => {
                tracing::debug!("No external printer: {e}");
                None
            }
        }
    }
}

impl Drop for RustylineReader {
    fn drop(&mut self) {
        self.save_history();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ansi(command: impl Command) -> String {
        let mut s = String::new();
        push_ansi(&mut s, command);
        s
    }

    #[test]
    fn handle_publish_snapshot_clear() {
        let handle = PendingLineHandle::new();
        assert!(handle.snapshot().is_none());

        handle.publish(PendingLine::new("> ", "he", 2));
        assert_eq!(handle.snapshot(), Some(PendingLine::new("> ", "he", 2)));

        handle.clear();
        assert!(handle.snapshot().is_none());
    }

    #[test]
    fn handle_clones_share_state() {
        let handle = PendingLineHandle::new();
        let other = handle.clone();
        other.publish(PendingLine::empty("$ "));
        assert_eq!(handle.snapshot(), Some(PendingLine::empty("$ ")));
    }

    #[test]
    fn erase_single_row_clears_current_line() {
        let line = PendingLine::new("> ", "hello", 5);
        assert_eq!(line.erase(80), format!("\r{}", ansi(Clear(ClearType::CurrentLine))));
    }

    #[test]
    fn erase_wrapped_moves_up_to_prompt_row() {
        // 2 + 10 = 12 columns on a 5-column terminal: cursor on row 2
        let line = PendingLine::new("> ", "abcdefghij", 10);
        let expected = format!(
            "{}\r{}",
            ansi(MoveUp(2)),
            ansi(Clear(ClearType::FromCursorDown))
        );
        assert_eq!(line.erase(5), expected);
    }

    #[test]
    fn redraw_cursor_at_end_has_no_movement() {
        let line = PendingLine::new("> ", "he", 2);
        assert_eq!(line.redraw(80), "> he");
    }

    #[test]
    fn redraw_restores_cursor_column() {
        let line = PendingLine::new("> ", "hello", 1);
        assert_eq!(line.redraw(80), format!("> hello{}", ansi(MoveToColumn(3))));
    }

    #[test]
    fn redraw_wrapped_moves_up_then_to_column() {
        // prompt 2 + "abcdefgh" 8 = 10 columns, width 4 -> end row 2
        // cursor at 1 -> column 3 of row 0
        let line = PendingLine::new("> ", "abcdefgh", 1);
        let expected = format!("> abcdefgh{}{}", ansi(MoveUp(2)), ansi(MoveToColumn(3)));
        assert_eq!(line.redraw(4), expected);
    }

    #[test]
    fn wide_chars_count_two_columns() {
        let line = PendingLine::new("> ", "日本", 3);
        // cursor after the first char: 2 + 2 = column 4
        assert_eq!(line.redraw(80), format!("> 日本{}", ansi(MoveToColumn(4))));
    }

    #[test]
    fn invalid_cursor_treated_as_end() {
        let line = PendingLine::new("> ", "ab", 99);
        assert_eq!(line.redraw(80), "> ab");
    }

    #[test]
    fn complete_first_word() {
        let commands = vec!["help".to_string(), "hello".to_string(), "quit".to_string()];

        let (start, matches) = complete_command(&commands, "he");
        assert_eq!(start, 0);
        assert_eq!(matches, vec!["help", "hello"]);

        let (start, matches) = complete_command(&commands, "  q");
        assert_eq!(start, 2);
        assert_eq!(matches, vec!["quit"]);
    }

    #[test]
    fn no_completion_after_first_word() {
        let commands = vec!["help".to_string()];
        let (start, matches) = complete_command(&commands, "echo he");
        assert_eq!(start, 7);
        assert!(matches.is_empty());
    }

    #[test]
    fn options_from_config() {
        let mut config = crate::config::TermConsoleConfig::default();
        config.history.max_size = 10;
        config.history.file = Some(PathBuf::from("/tmp/h"));

        let options = ReaderOptions::from_config(&config).with_commands(["help", "quit"]);
        assert_eq!(options.max_history, 10);
        assert_eq!(options.history_file, Some(PathBuf::from("/tmp/h")));
        assert_eq!(options.commands, vec!["help", "quit"]);

        config.history.enabled = false;
        assert!(ReaderOptions::from_config(&config).history_file.is_none());
    }
}
