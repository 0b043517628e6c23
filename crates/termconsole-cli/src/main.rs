//! termconsole - demo shell for the interactive console.
//!
//! Log output from background threads prints above the prompt while you
//! type. Try `spam 200 4` or start with `--heartbeat 1 -v`.
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`TERMCONSOLE_*`)
//! 3. Project config (`.termconsole/config.toml` in the project directory)
//! 4. Global config (`~/.termconsole/config.toml`, or `--config`)
//! 5. Default values (lowest priority)
//!
//! # Modes
//!
//! - No trailing command: interactive session until `quit`, EOF, Ctrl+C
//!   or SIGINT.
//! - Trailing command (`termconsole echo hi`): runs one command and exits,
//!   no console attached.

mod commands;
mod log_file;

use anyhow::Result;
use clap::Parser;
use commands::{ShellCommands, COMMAND_NAMES};
use log_file::LogFile;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use termconsole::config::{ConfigError, ConfigLoader, ConfigResolver, TermConsoleConfig};
use termconsole::{
    ansi_enabled, CommandHandler, CommandLoop, ConsoleMakeWriter, ConsoleOptions, ConsoleSlot,
    Coordinator, LogBridge, LoopOptions, ReaderOptions, RustylineReader, StdoutSink, TerminalMode,
};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// termconsole - interactive shell with log output above the prompt
#[derive(Parser, Debug)]
#[command(name = "termconsole")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging on the terminal
    #[arg(short, long)]
    debug: bool,

    /// Enable info logging on the terminal
    #[arg(short, long)]
    verbose: bool,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long)]
    project: Option<PathBuf>,

    /// Global config file (defaults to ~/.termconsole/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable the interactive terminal: plain sequential output
    #[arg(long)]
    plain: bool,

    /// Prompt text (also: TERMCONSOLE_PROMPT)
    #[arg(long)]
    prompt: Option<String>,

    /// Do not load or save line history
    #[arg(long)]
    no_history: bool,

    /// History file (also: TERMCONSOLE_HISTORY_FILE)
    #[arg(long, value_name = "PATH")]
    history_file: Option<PathBuf>,

    /// Enable file logging into this directory (also: TERMCONSOLE_LOG_FILE)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// File log level (default: debug)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log a heartbeat every SECS seconds from a background task
    #[arg(long, value_name = "SECS")]
    heartbeat: Option<u64>,

    /// Command to execute instead of starting the console
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

/// CLI-based configuration resolver.
///
/// Merges file/env config via [`ConfigLoader`] and applies CLI argument
/// overrides as the highest-priority layer.
struct CliConfigResolver {
    project_root: PathBuf,
    global_config: Option<PathBuf>,
    plain: bool,
    prompt: Option<String>,
    no_history: bool,
    history_file: Option<PathBuf>,
    log_file: Option<PathBuf>,
    log_level: Option<String>,
}

impl CliConfigResolver {
    fn from_args(args: &Args) -> Self {
        let project_root = args.project.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|e| {
                eprintln!("Warning: cannot read current directory ({e}), using '.'");
                PathBuf::from(".")
            })
        });

        Self {
            project_root,
            global_config: args.config.clone(),
            plain: args.plain,
            prompt: args.prompt.clone(),
            no_history: args.no_history,
            history_file: args.history_file.clone(),
            log_file: args.log_file.clone(),
            log_level: args.log_level.clone(),
        }
    }
}

impl ConfigResolver for CliConfigResolver {
    fn resolve(&self) -> Result<TermConsoleConfig, ConfigError> {
        let mut loader = ConfigLoader::new().with_project_root(&self.project_root);
        if let Some(ref path) = self.global_config {
            loader = loader.with_global_config(path);
        }
        let mut config = loader.load()?;

        // CLI args override (highest priority)
        if self.plain {
            config.console.terminal = false;
        }
        if let Some(ref prompt) = self.prompt {
            config.console.prompt.clone_from(prompt);
        }
        if self.no_history {
            config.history.enabled = false;
        }
        if let Some(ref p) = self.history_file {
            config.history.file = Some(p.clone());
        }
        if let Some(ref p) = self.log_file {
            config.logging.file = true;
            config.logging.file_path = Some(p.clone());
        }
        if let Some(ref level) = self.log_level {
            config.logging.file_level.clone_from(level);
        }

        Ok(config)
    }
}

/// Terminal filter: --debug > --verbose > RUST_LOG > configured level.
fn terminal_directive(
    debug: bool,
    verbose: bool,
    rust_log: Option<String>,
    configured: &str,
) -> String {
    if debug {
        "debug,rustyline=warn".into()
    } else if verbose {
        "info".into()
    } else {
        rust_log
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| configured.to_string())
    }
}

/// Installs the terminal layer (through the bridge) and the optional file
/// layer, each with an independent filter.
fn init_tracing(args: &Args, config: &TermConsoleConfig, bridge: Arc<LogBridge>, ansi: bool) {
    let directive = terminal_directive(
        args.debug,
        args.verbose,
        std::env::var("RUST_LOG").ok(),
        &config.logging.terminal_level,
    );
    let terminal_filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Warning: invalid log filter '{directive}' ({e}), using 'warn'");
        EnvFilter::new("warn")
    });
    let terminal_layer = fmt::layer()
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(ConsoleMakeWriter::new(bridge));

    let log_file = if config.logging.file {
        let dir = config.logging.resolved_file_path();
        match LogFile::open(&dir) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Warning: cannot open log file in {}: {e}", dir.display());
                None
            }
        }
    } else {
        None
    };

    if let Some(file) = log_file {
        let path = file.path().to_path_buf();
        let file_filter = EnvFilter::try_new(&config.logging.file_level)
            .unwrap_or_else(|_| EnvFilter::new("debug"));
        let file_layer = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(file);

        tracing_subscriber::registry()
            .with(terminal_layer.with_filter(terminal_filter))
            .with(file_layer.with_filter(file_filter))
            .init();

        info!(
            path = %path.display(),
            level = %config.logging.file_level,
            "File logging enabled"
        );
    } else {
        tracing_subscriber::registry()
            .with(terminal_layer.with_filter(terminal_filter))
            .init();
    }
}

async fn run_heartbeat(secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    interval.tick().await;
    let mut beat: u64 = 0;
    loop {
        interval.tick().await;
        beat += 1;
        info!(beat, "heartbeat");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = CliConfigResolver::from_args(&args);
    let config = resolver
        .resolve()
        .map_err(|e| anyhow::anyhow!("Config error: {e}"))?;

    // Links tracing output to the console once it is attached; until then
    // records go straight to stdout.
    let slot = ConsoleSlot::new();
    let bridge = Arc::new(
        LogBridge::new(slot.clone()).with_formatting_codes(config.console.formatting_codes),
    );

    if !args.command.is_empty() {
        let mode = TerminalMode::detect(&StdoutSink::new(), !config.console.terminal);
        init_tracing(&args, &config, bridge, ansi_enabled(config.console.ansi, mode));

        let line = args.command.join(" ");
        info!("Command mode: {line}");
        let mut shell = ShellCommands::new(slot).foreground();
        if let Err(e) = shell.handle(&line) {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
        return Ok(());
    }

    let reader_options =
        ReaderOptions::from_config(&config).with_commands(COMMAND_NAMES.iter().copied());
    let console = Coordinator::attach(
        StdoutSink::new(),
        move |pending| RustylineReader::new(pending, reader_options),
        ConsoleOptions::from_config(&config.console),
    )?;

    init_tracing(&args, &config, bridge, console.ansi_supported());
    slot.set(Arc::clone(&console));

    console.print_above(&format!(
        "termconsole v{} - type 'help' for commands\n",
        env!("CARGO_PKG_VERSION")
    ));
    info!(
        mode = ?console.mode(),
        project = %resolver.project_root.display(),
        "Console attached"
    );

    let command_loop = Arc::new(CommandLoop::new(
        Arc::clone(&console),
        ShellCommands::new(slot.clone()),
        LoopOptions::from_config(&config.console),
    ));
    command_loop.start()?;

    let heartbeat = args.heartbeat.map(|secs| tokio::spawn(run_heartbeat(secs)));

    let mut finished = {
        let command_loop = Arc::clone(&command_loop);
        tokio::task::spawn_blocking(move || command_loop.join())
    };

    let signal = tokio::select! {
        _ = &mut finished => None,
        signal = tokio::signal::ctrl_c() => Some(signal),
    };
    match signal {
        Some(Ok(())) => {
            info!("Interrupt signal received, shutting down");
            command_loop.shutdown();
            let _ = finished.await;
        }
        Some(Err(e)) => {
            tracing::warn!("Cannot listen for Ctrl+C: {e}");
            let _ = finished.await;
        }
        None => {}
    }

    if let Some(task) = heartbeat {
        task.abort();
    }

    // Detach before teardown output; records fall back to stdout.
    slot.clear();
    info!("Session ended");
    Ok(())
}
