//! Demo shell commands.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `help` | List commands |
//! | `ping` | Print `pong` |
//! | `echo <text>` | Print `text` |
//! | `log <level> <text>` | Emit a tracing event at `level` |
//! | `spam <count> [threads]` | Background threads each log `count` warnings |
//! | `status` | Show console state |
//! | `boom` | Always fails |
//! | `quit` / `exit` | End the session |

use anyhow::{bail, Context};
use std::str::FromStr;
use std::thread::JoinHandle;
use std::time::Instant;
use termconsole::{CommandHandler, ConsoleSlot};
use tracing::Level;

/// Names offered for tab completion.
pub const COMMAND_NAMES: &[&str] = &[
    "help", "ping", "echo", "log", "spam", "status", "boom", "quit", "exit",
];

const HELP: &str = "\
Commands:
  help                    show this list
  ping                    reply with pong
  echo <text>             print text
  log <level> <text>      emit a log event (trace|debug|info|warn|error)
  spam <count> [threads]  log from background threads while you type
  status                  show console state
  boom                    fail on purpose
  quit, exit              end the session
";

/// Upper bound for `spam` producer threads.
const MAX_SPAM_THREADS: usize = 64;

/// Handler for the demo shell.
///
/// Output goes through the attached console when there is one, straight
/// to stdout otherwise (one-shot mode).
pub struct ShellCommands {
    slot: ConsoleSlot,
    started: Instant,
    /// Wait for `spam` producers before returning.
    foreground: bool,
}

impl ShellCommands {
    pub fn new(slot: ConsoleSlot) -> Self {
        Self {
            slot,
            started: Instant::now(),
            foreground: false,
        }
    }

    /// Runs background work to completion; used when no console outlives
    /// the command.
    #[must_use]
    pub fn foreground(mut self) -> Self {
        self.foreground = true;
        self
    }

    fn say(&self, text: &str) {
        let mut line = text.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        match self.slot.get() {
            Some(console) => {
                console.print_above(&line);
            }
            None => print!("{line}"),
        }
    }

    fn log(&self, args: &str) -> anyhow::Result<()> {
        let (level, text) = args.split_once(' ').unwrap_or((args, ""));
        if level.is_empty() {
            bail!("usage: log <level> <text>");
        }
        let level = Level::from_str(level)
            .map_err(|_| anyhow::anyhow!("unknown level '{level}'"))?;
        let text = text.trim();

        match level {
            Level::TRACE => tracing::trace!("{text}"),
            Level::DEBUG => tracing::debug!("{text}"),
            Level::INFO => tracing::info!("{text}"),
            Level::WARN => tracing::warn!("{text}"),
            _ => tracing::error!("{text}"),
        }
        Ok(())
    }

    fn spam(&self, args: &str) -> anyhow::Result<()> {
        let mut parts = args.split_whitespace();
        let count: usize = parts
            .next()
            .context("usage: spam <count> [threads]")?
            .parse()
            .context("count must be a number")?;
        let threads: usize = match parts.next() {
            Some(n) => n.parse().context("threads must be a number")?,
            None => 1,
        };
        if threads == 0 || threads > MAX_SPAM_THREADS {
            bail!("threads must be between 1 and {MAX_SPAM_THREADS}");
        }

        let handles = (0..threads)
            .map(|t| {
                std::thread::Builder::new()
                    .name(format!("spam-{t}"))
                    .spawn(move || {
                        for i in 1..=count {
                            tracing::warn!(producer = t, "spam {i}/{count}");
                        }
                    })
            })
            .collect::<Result<Vec<JoinHandle<()>>, _>>()
            .context("failed to spawn spam thread")?;

        if self.foreground {
            for handle in handles {
                let _ = handle.join();
            }
        }
        Ok(())
    }

    fn status(&self) {
        let uptime = self.started.elapsed().as_secs();
        match self.slot.get() {
            Some(console) => self.say(&format!(
                "mode: {:?} (detected {:?})\nreader: {:?}\nansi: {}\nsink lost: {}\nuptime: {uptime}s",
                console.mode(),
                console.detected_mode(),
                console.reader_state(),
                console.ansi_supported(),
                console.is_sink_lost(),
            )),
            None => self.say(&format!("mode: one-shot\nuptime: {uptime}s")),
        }
    }

    fn quit(&self) {
        if let Some(console) = self.slot.get() {
            tracing::info!("Quit requested");
            console.shutdown();
        }
    }
}

impl CommandHandler for ShellCommands {
    fn handle(&mut self, line: &str) -> anyhow::Result<()> {
        let (command, args) = line.split_once(' ').unwrap_or((line, ""));
        let args = args.trim();

        match command {
            "help" => self.say(HELP),
            "ping" => self.say("pong"),
            "echo" => self.say(args),
            "log" => self.log(args)?,
            "spam" => self.spam(args)?,
            "status" => self.status(),
            "boom" => bail!("boom: this command always fails"),
            "quit" | "exit" => self.quit(),
            other => bail!("unknown command '{other}', try 'help'"),
        }
        Ok(())
    }
}
