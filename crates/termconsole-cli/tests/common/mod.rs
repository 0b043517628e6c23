//! Shared E2E test helpers for `termconsole` binary tests.

use assert_cmd::cargo::cargo_bin_cmd;
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT_BASIC: Duration = Duration::from_secs(10);

/// Variables that would leak the developer's settings into a test run.
pub const ISOLATED_VARS: &[&str] = &[
    "RUST_LOG",
    "TERMCONSOLE_PROMPT",
    "TERMCONSOLE_TERMINAL",
    "TERMCONSOLE_ANSI",
    "TERMCONSOLE_INTERRUPT",
    "TERMCONSOLE_FORMATTING_CODES",
    "TERMCONSOLE_LOG_LEVEL",
    "TERMCONSOLE_LOG_FILE",
    "TERMCONSOLE_HISTORY_FILE",
];

/// Build a Command for the `termconsole` binary isolated in a tempdir.
///
/// `HOME`, the project root and the history file all point into the
/// tempdir, so no user config is read and nothing is written outside it.
/// Returns (command, _guard). Keep the guard alive for the test's duration.
pub fn termconsole_cmd() -> (assert_cmd::Command, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("create temp dir for test home");
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("termconsole");
    cmd.timeout(TIMEOUT_BASIC);
    for var in ISOLATED_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", tmp.path());
    cmd.args([
        "-C",
        tmp.path().to_str().expect("valid utf8"),
        "--history-file",
        tmp.path().join("history").to_str().expect("valid utf8"),
    ]);
    (cmd, tmp)
}
