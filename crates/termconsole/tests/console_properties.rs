//! End-to-end properties of the coordinator, bridge and dispatch loop,
//! driven through in-memory sinks and scripted readers.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use termconsole::testing::{scripted_reader, wait_until, CaptureSink, ScriptHandle};
use termconsole::{
    attach_console, CommandLoop, Coordinator, LoopOptions, LoopState, PendingLine, PrintOutcome,
    ReadOutcome, ReaderState, TerminalMode,
};

const WAIT: Duration = Duration::from_secs(5);

fn console(sink: &CaptureSink) -> (ScriptHandle, Arc<Coordinator>) {
    let (input, make) = scripted_reader();
    let console = attach_console(sink.clone(), make).expect("attach");
    (input, console)
}

/// Starts a read on another thread; the outcome arrives on the receiver.
fn spawn_read(console: &Arc<Coordinator>) -> mpsc::Receiver<ReadOutcome> {
    let (tx, rx) = mpsc::channel();
    let console = Arc::clone(console);
    thread::spawn(move || {
        if let Ok(outcome) = console.begin_read() {
            let _ = tx.send(outcome);
        }
    });
    rx
}

#[test]
fn concurrent_writers_never_interleave() {
    let sink = CaptureSink::interactive();
    let (_input, console) = console(&sink);

    let threads: Vec<_> = (0..8)
        .map(|t| {
            let console = Arc::clone(&console);
            thread::spawn(move || {
                for i in 0..50 {
                    let payload = format!("thread {t} message {i}\n  detail {t}/{i}\n");
                    assert_eq!(console.print_above(&payload), PrintOutcome::Written);
                }
            })
        })
        .collect();
    for handle in threads {
        handle.join().expect("writer thread");
    }

    let writes = sink.writes();
    assert_eq!(writes.len(), 400);
    for write in &writes {
        let text = String::from_utf8(write.clone()).expect("utf8");
        let mut lines = text.lines();
        let head = lines.next().expect("head line");
        let detail = lines.next().expect("detail line");
        assert!(lines.next().is_none());

        let ids = head.strip_prefix("thread ").expect("prefix");
        let (t, i) = ids.split_once(" message ").expect("ids");
        assert_eq!(detail, format!("  detail {t}/{i}"));
    }
}

#[test]
fn log_line_lands_above_pending_input() {
    let sink = CaptureSink::interactive();
    let (input, console) = console(&sink);

    let outcome = spawn_read(&console);
    input.set_pending("he", 2);
    let expected = PendingLine::new("> ", "he", 2);
    assert!(wait_until(WAIT, || console.pending_line().as_ref() == Some(&expected)));

    sink.clear();
    assert_eq!(console.print_above("WARN: disk full"), PrintOutcome::Written);

    // erase, log line, then prompt with the buffer and the cursor at its end
    assert_eq!(sink.contents(), "\r\x1b[2KWARN: disk full\n> he");
    assert_eq!(sink.writes().len(), 1);
    assert_eq!(console.pending_line(), Some(expected));

    input.send_line("hello");
    assert_eq!(
        outcome.recv_timeout(WAIT).expect("read result"),
        ReadOutcome::Line("hello".into())
    );
    assert_eq!(console.reader_state(), ReaderState::Idle);
}

#[test]
fn wrapped_prompt_is_erased_from_its_first_row() {
    let sink = CaptureSink::interactive().with_width(10);
    let (input, console) = console(&sink);

    let _outcome = spawn_read(&console);
    // 2 + 14 columns on a 10-column terminal: two rows
    input.set_pending("abcdefghijklmn", 14);
    assert!(wait_until(WAIT, || console
        .pending_line()
        .is_some_and(|p| p.cursor == 14)));

    sink.clear();
    console.print_above("log\n");
    assert_eq!(
        sink.contents(),
        "\x1b[1A\r\x1b[Jlog\n> abcdefghijklmn"
    );

    console.shutdown();
}

#[test]
fn shutdown_unblocks_read_and_discards_later_writes() {
    let sink = CaptureSink::plain();
    let (_input, console) = console(&sink);

    let outcome = spawn_read(&console);
    assert!(wait_until(WAIT, || console.reader_state()
        == ReaderState::AwaitingInput));

    console.shutdown();
    assert_eq!(
        outcome.recv_timeout(WAIT).expect("read must return"),
        ReadOutcome::Cancelled
    );

    assert_eq!(console.print_above("too late\n"), PrintOutcome::Discarded);
    assert!(sink.bytes().is_empty());
    assert_eq!(console.begin_read().expect("read"), ReadOutcome::Cancelled);
}

#[test]
fn plain_mode_output_is_byte_identical() {
    let sink = CaptureSink::plain();
    let (_input, console) = console(&sink);
    assert_eq!(console.mode(), TerminalMode::Plain);

    let payloads = ["first\n", "no newline", "multi\nline\n", "§ and \x1b[31mcolor\x1b[0m\n"];

    console.print_above(payloads[0]);
    // An active read changes nothing in plain mode.
    let _outcome = spawn_read(&console);
    assert!(wait_until(WAIT, || console.pending_line().is_some()));
    for payload in &payloads[1..] {
        console.print_above(payload);
    }

    assert_eq!(sink.bytes(), payloads.concat().into_bytes());
    console.shutdown();
    assert_eq!(sink.bytes(), payloads.concat().into_bytes());
}

#[test]
fn failing_command_does_not_block_next() {
    let (input, make) = scripted_reader();
    let console = attach_console(CaptureSink::plain(), make).expect("attach");

    let handled = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&handled);
    let handler = move |line: &str| -> anyhow::Result<()> {
        if line == "boom" {
            anyhow::bail!("boom always fails");
        }
        record.lock().push(line.to_string());
        Ok(())
    };

    let command_loop = CommandLoop::new(console, handler, LoopOptions::default());
    command_loop.start().expect("start");
    input.send_line("boom");
    input.send_line("ping");
    input.send_eof();
    command_loop.join();

    assert_eq!(*handled.lock(), vec!["ping"]);
    assert_eq!(command_loop.state(), LoopState::Stopped);
}

#[test]
fn double_shutdown_is_idempotent() {
    let sink = CaptureSink::interactive();
    let (_input, console) = console(&sink);

    let outcome = spawn_read(&console);
    assert!(wait_until(WAIT, || console.pending_line().is_some()));

    console.shutdown();
    let after_first = sink.bytes();
    console.shutdown();

    assert_eq!(sink.bytes(), after_first);
    assert_eq!(after_first, b"\n");
    assert_eq!(console.reader_state(), ReaderState::Closed);
    assert_eq!(
        outcome.recv_timeout(WAIT).expect("read result"),
        ReadOutcome::Cancelled
    );
}

#[test]
fn loop_shutdown_from_another_thread() {
    let (_input, make) = scripted_reader();
    let console = attach_console(CaptureSink::plain(), make).expect("attach");
    let command_loop = Arc::new(CommandLoop::new(
        console,
        |_: &str| -> anyhow::Result<()> { Ok(()) },
        LoopOptions::default(),
    ));
    command_loop.start().expect("start");
    assert!(wait_until(WAIT, || command_loop.console().reader_state()
        == ReaderState::AwaitingInput));

    let stopper = Arc::clone(&command_loop);
    thread::spawn(move || stopper.shutdown())
        .join()
        .expect("stopper");
    command_loop.join();

    assert!(!command_loop.is_running());
    assert_eq!(command_loop.state(), LoopState::Stopped);
}

#[test]
fn broken_sink_downgrades_then_goes_quiet() {
    let sink = CaptureSink::interactive();
    let (input, console) = console(&sink);

    let _outcome = spawn_read(&console);
    input.set_pending("typing", 6);
    assert!(wait_until(WAIT, || console
        .pending_line()
        .is_some_and(|p| p.buffer == "typing")));

    sink.fail_next(1);
    assert!(matches!(console.print_above("a\n"), PrintOutcome::Failed(_)));
    assert_eq!(console.mode(), TerminalMode::Plain);

    // No more redraws after the downgrade.
    sink.clear();
    console.print_above("b\n");
    assert_eq!(sink.contents(), "b\n");

    sink.fail_always();
    assert!(matches!(console.print_above("c\n"), PrintOutcome::Failed(_)));
    assert!(console.is_sink_lost());
    assert_eq!(console.print_above("d\n"), PrintOutcome::Discarded);

    console.shutdown();
}
