//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Main configuration structure.
///
/// This is the unified configuration after merging all layers.
/// Every section is `#[serde(default)]`, so a config file only needs
/// the keys it wants to change.
///
/// # Example
///
/// ```
/// use termconsole::config::TermConsoleConfig;
///
/// let config = TermConsoleConfig::default();
/// assert_eq!(config.console.prompt, "> ");
/// assert!(config.console.terminal);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TermConsoleConfig {
    /// Console behaviour (prompt, terminal mode, policies).
    pub console: ConsoleConfig,

    /// Line editor history.
    pub history: HistoryConfig,

    /// Log output targets and levels.
    pub logging: LoggingConfig,
}

impl TermConsoleConfig {
    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override only where they differ from the
    /// compiled default, so a sparse file never resets earlier layers.
    pub fn merge(&mut self, other: &Self) {
        self.console.merge(&other.console);
        self.history.merge(&other.history);
        self.logging.merge(&other.logging);
    }
}

/// Whether ANSI escape sequences may be emitted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnsiMode {
    /// ANSI when the terminal was detected as interactive.
    #[default]
    Auto,
    /// Always emit ANSI, even into pipes.
    Always,
    /// Never emit ANSI.
    Never,
}

impl FromStr for AnsiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" | "on" | "true" => Ok(Self::Always),
            "never" | "off" | "false" => Ok(Self::Never),
            other => Err(format!("expected auto|always|never, got '{other}'")),
        }
    }
}

/// What Ctrl+C at the prompt does.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InterruptPolicy {
    /// End the session, same as end-of-input.
    #[default]
    Stop,
    /// Discard the current line and keep reading.
    Clear,
}

impl FromStr for InterruptPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stop" => Ok(Self::Stop),
            "clear" => Ok(Self::Clear),
            other => Err(format!("expected stop|clear, got '{other}'")),
        }
    }
}

/// Console configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Prompt shown before user input.
    pub prompt: String,

    /// Use the interactive terminal when available.
    ///
    /// `false` forces plain sequential output even on a TTY.
    pub terminal: bool,

    /// ANSI escape policy.
    pub ansi: AnsiMode,

    /// Ctrl+C behaviour.
    pub interrupt: InterruptPolicy,

    /// Convert `§` formatting codes in log records.
    pub formatting_codes: bool,

    /// End the session once the terminal sink is lost.
    pub stop_on_sink_loss: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".into(),
            terminal: true,
            ansi: AnsiMode::Auto,
            interrupt: InterruptPolicy::Stop,
            formatting_codes: false,
            stop_on_sink_loss: true,
        }
    }
}

impl ConsoleConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.prompt != default.prompt {
            self.prompt.clone_from(&other.prompt);
        }
        if other.terminal != default.terminal {
            self.terminal = other.terminal;
        }
        if other.ansi != default.ansi {
            self.ansi = other.ansi;
        }
        if other.interrupt != default.interrupt {
            self.interrupt = other.interrupt;
        }
        if other.formatting_codes != default.formatting_codes {
            self.formatting_codes = other.formatting_codes;
        }
        if other.stop_on_sink_loss != default.stop_on_sink_loss {
            self.stop_on_sink_loss = other.stop_on_sink_loss;
        }
    }
}

/// History configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Persist history between sessions.
    pub enabled: bool,

    /// History file path.
    ///
    /// When `None`, defaults to `~/.termconsole/history`.
    pub file: Option<PathBuf>,

    /// Maximum number of entries kept.
    pub max_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: None,
            max_size: 1000,
        }
    }
}

impl HistoryConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }
        if other.file.is_some() {
            self.file.clone_from(&other.file);
        }
        if other.max_size != default.max_size {
            self.max_size = other.max_size;
        }
    }

    /// Returns the history file path, falling back to the default.
    #[must_use]
    pub fn file_or_default(&self) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| super::default_config_dir().join("history"))
    }
}

/// Logging configuration.
///
/// # Example TOML
///
/// ```toml
/// [logging]
/// terminal_level = "info"
/// file = true
/// file_level = "trace"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive for the terminal layer.
    pub terminal_level: String,

    /// Also append log records to a file.
    pub file: bool,

    /// Log directory. When `None`, defaults to `~/.termconsole/logs`.
    pub file_path: Option<PathBuf>,

    /// Filter directive for the file layer.
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            terminal_level: "warn".into(),
            file: false,
            file_path: None,
            file_level: "debug".into(),
        }
    }
}

impl LoggingConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.terminal_level != default.terminal_level {
            self.terminal_level.clone_from(&other.terminal_level);
        }
        if other.file != default.file {
            self.file = other.file;
        }
        if other.file_path.is_some() {
            self.file_path.clone_from(&other.file_path);
        }
        if other.file_level != default.file_level {
            self.file_level.clone_from(&other.file_level);
        }
    }

    /// Returns the log directory, falling back to the default.
    #[must_use]
    pub fn resolved_file_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| super::default_config_dir().join("logs"))
    }
}
