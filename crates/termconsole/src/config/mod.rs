//! Configuration management with hierarchical layering.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌───────────────────────────────────────────────────┐
//! │  1. CLI flags (ConfigResolver in the frontend)     │
//! ├───────────────────────────────────────────────────┤
//! │  2. Environment Variables (TERMCONSOLE_*)          │
//! ├───────────────────────────────────────────────────┤
//! │  3. Project Config (.termconsole/config.toml)      │
//! ├───────────────────────────────────────────────────┤
//! │  4. Global Config (~/.termconsole/config.toml)     │
//! ├───────────────────────────────────────────────────┤
//! │  5. Default Values (compile-time)                  │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `TERMCONSOLE_PROMPT` | `console.prompt` | String |
//! | `TERMCONSOLE_TERMINAL` | `console.terminal` | bool |
//! | `TERMCONSOLE_ANSI` | `console.ansi` | auto/always/never |
//! | `TERMCONSOLE_INTERRUPT` | `console.interrupt` | stop/clear |
//! | `TERMCONSOLE_FORMATTING_CODES` | `console.formatting_codes` | bool |
//! | `TERMCONSOLE_LOG_LEVEL` | `logging.terminal_level` | String |
//! | `TERMCONSOLE_LOG_FILE` | `logging.file_path` (enables file logging) | PathBuf |
//! | `TERMCONSOLE_HISTORY_FILE` | `history.file` | PathBuf |
//!
//! # Example Configuration
//!
//! ```toml
//! # ~/.termconsole/config.toml
//!
//! [console]
//! prompt = "app> "
//! terminal = true
//! ansi = "auto"
//! interrupt = "stop"
//!
//! [history]
//! max_size = 500
//!
//! [logging]
//! terminal_level = "info"
//! file = true
//! ```

mod error;
mod loader;
mod resolver;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use resolver::ConfigResolver;
pub use types::{
    AnsiMode, ConsoleConfig, HistoryConfig, InterruptPolicy, LoggingConfig, TermConsoleConfig,
};

/// Default global config directory.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".termconsole")
}

/// Default global config file path.
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".termconsole";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";
