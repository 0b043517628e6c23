//! Console error types.
//!
//! [`ConsoleError`] covers every failure the console surfaces to callers.
//! Best-effort paths (log output, redraw) never return it; they report a
//! [`PrintOutcome`](crate::PrintOutcome) instead.

use crate::config::ConfigError;
use thiserror::Error;

/// Machine-readable error classification.
///
/// Implemented by every error type in this crate so that frontends can
/// branch on a stable code instead of parsing `Display` output.
pub trait ErrorCode {
    /// Returns a stable UPPER_SNAKE_CASE code (e.g. `"CONSOLE_READER"`).
    fn code(&self) -> &'static str;

    /// Returns whether the caller can reasonably retry or recover.
    fn is_recoverable(&self) -> bool;
}

/// Unified console error.
///
/// # Example
///
/// ```
/// use termconsole::{ConsoleError, ErrorCode};
///
/// let err = ConsoleError::AlreadyStarted;
/// assert_eq!(err.code(), "CONSOLE_ALREADY_STARTED");
/// assert!(!err.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The line editor failed to initialize or read.
    #[error("line reader error: {0}")]
    Reader(String),

    /// A worker thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The dispatch loop was started twice.
    #[error("command loop already started")]
    AlreadyStarted,

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl ConsoleError {
    /// Creates a reader error from any displayable cause.
    pub fn reader(cause: impl std::fmt::Display) -> Self {
        Self::Reader(cause.to_string())
    }

    /// Creates a spawn error for the named thread.
    pub fn spawn(name: &'static str, source: std::io::Error) -> Self {
        Self::Spawn { name, source }
    }
}

impl From<rustyline::error::ReadlineError> for ConsoleError {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        Self::reader(err)
    }
}

impl ErrorCode for ConsoleError {
    fn code(&self) -> &'static str {
        match self {
            Self::Reader(_) => "CONSOLE_READER",
            Self::Spawn { .. } => "CONSOLE_SPAWN",
            Self::AlreadyStarted => "CONSOLE_ALREADY_STARTED",
            Self::Config(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Reader(_) => false,
            Self::Spawn { .. } => true,
            Self::AlreadyStarted => false,
            Self::Config(e) => e.is_recoverable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts() {
        let err = ConfigError::invalid_env_var("TERMCONSOLE_ANSI", "expected auto|always|never");
        let console_err: ConsoleError = err.into();
        assert!(matches!(console_err, ConsoleError::Config(_)));
        assert_eq!(console_err.code(), "CONFIG_INVALID_ENV_VAR");
    }

    #[test]
    fn error_codes() {
        let err = ConsoleError::reader("terminal vanished");
        assert_eq!(err.code(), "CONSOLE_READER");
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("terminal vanished"));

        let err = ConsoleError::AlreadyStarted;
        assert_eq!(err.code(), "CONSOLE_ALREADY_STARTED");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn spawn_error_names_thread() {
        let err = ConsoleError::spawn(
            "reader",
            std::io::Error::new(std::io::ErrorKind::Other, "no threads left"),
        );
        assert!(err.to_string().contains("reader"));
        assert!(err.to_string().contains("no threads left"));
    }
}
