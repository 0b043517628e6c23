//! Log bridge: routes formatted log records into the console.
//!
//! ```text
//! tracing event ─▶ fmt layer ─▶ ConsoleWriter (buffers one event)
//!                                    │ drop
//!                                    ▼
//!                         LogBridge::on_log_record
//!                                    │
//!               slot set? ───yes───▶ Coordinator::print_above
//!                   │
//!                   no ────────────▶ fallback sink (stdout)
//! ```
//!
//! The [`ConsoleSlot`] is created before the subscriber is installed and
//! filled once the console is attached, so records emitted during startup
//! and teardown still reach the terminal.
//!
//! The bridge never fails back into the logging pipeline. The first write
//! failure is reported once through a side-channel diagnostic (stderr by
//! default); records raised while the bridge is already running on the
//! same thread are dropped instead of recursing.

use crate::coordinator::{Coordinator, PrintOutcome};
use crate::format::convert_formatting_codes;
use crate::sink::{StdoutSink, TerminalSink};
use parking_lot::{Mutex, RwLock};
use std::cell::Cell;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared slot holding the attached [`Coordinator`], if any.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSlot {
    inner: Arc<RwLock<Option<Arc<Coordinator>>>>,
}

impl ConsoleSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes subsequent records through `console`.
    pub fn set(&self, console: Arc<Coordinator>) {
        *self.inner.write() = Some(console);
    }

    /// Detaches the console; records fall back to plain output.
    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    /// Returns the attached console.
    #[must_use]
    pub fn get(&self) -> Option<Arc<Coordinator>> {
        self.inner.read().clone()
    }
}

thread_local! {
    static IN_BRIDGE: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside the bridge.
struct ReentryGuard;

impl ReentryGuard {
    fn enter() -> Option<Self> {
        IN_BRIDGE.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(Self)
            }
        })
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        IN_BRIDGE.with(|flag| flag.set(false));
    }
}

type Diagnostic = Box<dyn Fn(&str) + Send + Sync>;

fn stderr_diagnostic(message: &str) {
    let _ = writeln!(io::stderr(), "termconsole: {message}");
}

/// Adapts per-record log callbacks to [`Coordinator::print_above`].
pub struct LogBridge {
    slot: ConsoleSlot,
    fallback: Mutex<Box<dyn TerminalSink>>,
    formatting_codes: bool,
    diagnostic: Diagnostic,
    reported: AtomicBool,
}

impl std::fmt::Debug for LogBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBridge")
            .field("slot", &self.slot)
            .field("formatting_codes", &self.formatting_codes)
            .field("reported", &self.reported)
            .finish_non_exhaustive()
    }
}

impl LogBridge {
    /// Creates a bridge over `slot`, falling back to stdout.
    #[must_use]
    pub fn new(slot: ConsoleSlot) -> Self {
        Self {
            slot,
            fallback: Mutex::new(Box::new(StdoutSink::new())),
            formatting_codes: false,
            diagnostic: Box::new(stderr_diagnostic),
            reported: AtomicBool::new(false),
        }
    }

    /// Enables `§` formatting-code conversion.
    #[must_use]
    pub fn with_formatting_codes(mut self, enabled: bool) -> Self {
        self.formatting_codes = enabled;
        self
    }

    /// Replaces the sink used while no console is attached.
    #[must_use]
    pub fn with_fallback(mut self, sink: impl TerminalSink + 'static) -> Self {
        self.fallback = Mutex::new(Box::new(sink));
        self
    }

    /// Replaces the side-channel diagnostic.
    #[must_use]
    pub fn with_diagnostic(mut self, diagnostic: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.diagnostic = Box::new(diagnostic);
        self
    }

    /// The slot this bridge reads from.
    #[must_use]
    pub fn slot(&self) -> &ConsoleSlot {
        &self.slot
    }

    /// Returns `true` once a failure has been reported.
    #[must_use]
    pub fn has_reported_failure(&self) -> bool {
        self.reported.load(Ordering::Relaxed)
    }

    /// Logging integration point: forwards one formatted record.
    ///
    /// Never panics and never returns an error. A multi-line record is
    /// written as a single sequence.
    pub fn on_log_record(&self, text: &str) {
        let Some(_guard) = ReentryGuard::enter() else {
            return;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| self.deliver(text))) {
            Ok(PrintOutcome::Failed(kind)) => self.report_once(&format!(
                "log output failed ({kind}); further failures are not reported"
            )),
            Ok(PrintOutcome::Written | PrintOutcome::Discarded) => {}
            Err(_) => self.report_once("log output panicked; further failures are not reported"),
        }
    }

    /// Writes `text` to the attached console or the fallback sink.
    pub fn deliver(&self, text: &str) -> PrintOutcome {
        if text.is_empty() {
            return PrintOutcome::Written;
        }

        if let Some(console) = self.slot.get() {
            let text = self.convert(text, console.ansi_supported());
            return console.print_above(&text);
        }

        let mut fallback = self.fallback.lock();
        let text = self.convert(text, fallback.is_interactive());
        match fallback.write(text.as_bytes()) {
            Ok(()) => PrintOutcome::Written,
            Err(e) => PrintOutcome::Failed(e.kind()),
        }
    }

    fn convert<'a>(&self, text: &'a str, ansi: bool) -> std::borrow::Cow<'a, str> {
        if self.formatting_codes {
            convert_formatting_codes(text, ansi)
        } else {
            std::borrow::Cow::Borrowed(text)
        }
    }

    fn report_once(&self, message: &str) {
        if !self.reported.swap(true, Ordering::SeqCst) {
            (self.diagnostic)(message);
        }
    }
}

/// [`MakeWriter`](tracing_subscriber::fmt::MakeWriter) feeding a [`LogBridge`].
#[derive(Debug, Clone)]
pub struct ConsoleMakeWriter {
    bridge: Arc<LogBridge>,
}

impl ConsoleMakeWriter {
    pub fn new(bridge: Arc<LogBridge>) -> Self {
        Self { bridge }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            bridge: Arc::clone(&self.bridge),
            buf: Vec::with_capacity(256),
        }
    }
}

/// Per-event writer. Buffers the formatted event and hands it to the
/// bridge on [`Drop`].
pub struct ConsoleWriter {
    bridge: Arc<LogBridge>,
    buf: Vec<u8>,
}

impl Write for ConsoleWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let record = String::from_utf8_lossy(&self.buf);
        self.bridge.on_log_record(&record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scripted_reader, CaptureSink};
    use crate::{attach_console, ConsoleOptions};

    fn attached(sink: &CaptureSink) -> Arc<Coordinator> {
        let (_h, make) = scripted_reader();
        attach_console(sink.clone(), make).expect("attach")
    }

    fn recording_bridge(slot: ConsoleSlot) -> (LogBridge, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let bridge = LogBridge::new(slot)
            .with_fallback(CaptureSink::plain())
            .with_diagnostic(move |msg| sink.lock().push(msg.to_string()));
        (bridge, seen)
    }

    #[test]
    fn empty_slot_uses_fallback() {
        let fallback = CaptureSink::plain();
        let bridge = LogBridge::new(ConsoleSlot::new()).with_fallback(fallback.clone());

        bridge.on_log_record("starting\n");
        assert_eq!(fallback.contents(), "starting\n");
    }

    #[test]
    fn attached_console_receives_records() {
        let sink = CaptureSink::plain();
        let slot = ConsoleSlot::new();
        slot.set(attached(&sink));

        let (bridge, _) = recording_bridge(slot.clone());
        bridge.on_log_record("line one\nline two\n");
        assert_eq!(sink.writes(), vec![b"line one\nline two\n".to_vec()]);

        slot.clear();
        assert!(slot.get().is_none());
    }

    #[test]
    fn closed_console_drops_silently() {
        let sink = CaptureSink::plain();
        let slot = ConsoleSlot::new();
        let console = attached(&sink);
        slot.set(Arc::clone(&console));
        console.shutdown();

        let (bridge, seen) = recording_bridge(slot);
        bridge.on_log_record("late\n");
        assert!(sink.bytes().is_empty());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn failure_reported_once() {
        let sink = CaptureSink::plain();
        sink.fail_always();
        let slot = ConsoleSlot::new();
        slot.set(attached(&sink));

        let (bridge, seen) = recording_bridge(slot);
        for _ in 0..5 {
            bridge.on_log_record("lost\n");
        }
        assert_eq!(seen.lock().len(), 1);
        assert!(bridge.has_reported_failure());
    }

    #[test]
    fn reentrant_record_dropped() {
        let fallback = CaptureSink::plain();
        let bridge = Arc::new(LogBridge::new(ConsoleSlot::new()).with_fallback(fallback.clone()));

        let _guard = ReentryGuard::enter().expect("first entry");
        bridge.on_log_record("recursive\n");
        assert!(fallback.bytes().is_empty());
    }

    #[test]
    fn formatting_codes_follow_console_ansi() {
        let sink = CaptureSink::interactive();
        let slot = ConsoleSlot::new();
        let (_h, make) = scripted_reader();
        let options = ConsoleOptions {
            ansi: crate::config::AnsiMode::Never,
            ..ConsoleOptions::default()
        };
        slot.set(Coordinator::attach(sink.clone(), make, options).expect("attach"));

        let bridge = LogBridge::new(slot).with_formatting_codes(true);
        bridge.on_log_record("§cred§r\n");
        assert_eq!(sink.contents(), "red\n");
    }

    #[test]
    fn tracing_event_is_one_record() {
        use tracing_subscriber::layer::SubscriberExt;

        let sink = CaptureSink::plain();
        let slot = ConsoleSlot::new();
        slot.set(attached(&sink));
        let bridge = Arc::new(LogBridge::new(slot));

        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_writer(ConsoleMakeWriter::new(bridge))
                .with_ansi(false)
                .without_time()
                .with_target(false),
        );
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("disk full");
            tracing::info!("second");
        });

        let writes = sink.writes();
        assert_eq!(writes.len(), 2);
        assert!(String::from_utf8_lossy(&writes[0]).contains("WARN"));
        assert!(String::from_utf8_lossy(&writes[0]).contains("disk full"));
        assert!(String::from_utf8_lossy(&writes[1]).contains("second"));
    }

    #[test]
    fn colored_record_above_active_prompt() {
        use crate::testing::wait_until;
        use std::time::Duration;

        let sink = CaptureSink::interactive();
        let slot = ConsoleSlot::new();
        let (handle, make) = scripted_reader();
        let console = attach_console(sink.clone(), make).expect("attach");
        slot.set(Arc::clone(&console));

        let reader = {
            let console = Arc::clone(&console);
            std::thread::spawn(move || console.begin_read())
        };
        handle.set_pending("he", 2);
        assert!(wait_until(Duration::from_secs(5), || console
            .pending_line()
            .is_some_and(|p| p.buffer == "he")));
        sink.clear();

        let bridge = LogBridge::new(slot).with_formatting_codes(true);
        bridge.on_log_record("§cWARN: disk full\n");
        // No blank line between the record and the redrawn prompt.
        assert_eq!(
            sink.contents(),
            "\r\x1b[2K\x1b[0;31;1mWARN: disk full\x1b[m\n> he"
        );

        handle.send_eof();
        reader.join().expect("join").expect("read");
    }
}
