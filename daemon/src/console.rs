/// Control console: line-oriented commands on stdin that stand in for the
/// start / pause / stop buttons and the parameter fields.
///
/// Parsing is a pure function so the command set can be tested without a
/// terminal; [`spawn`] only pumps stdin lines into the daemon's event channel.
///
/// Stdin is read on a dedicated OS thread that is never joined: a blocking
/// read cannot be cancelled, and the process must be free to exit while the
/// thread is still parked in it.
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::warn;

use crate::event::DaemonEvent;

pub const USAGE: &str = "commands: start | pause | resume | stop | status | \
set <Directory|ExpirationDays|BackupSource|BackupTarget> <value> | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    /// Flip between paused and running, like a single pause button.
    TogglePause,
    Resume,
    Stop,
    Status,
    /// Change one `[TASKS]` field and save the config file.
    Set { key: String, value: String },
    Quit,
}

/// Parses one console line. Verbs are case-insensitive; the `set` value keeps
/// its case and inner spaces so paths survive intact.
///
/// Returns `None` for blank or unrecognised input.
pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match (verb.to_ascii_lowercase().as_str(), rest.is_empty()) {
        ("start", true) => Some(ConsoleCommand::Start),
        ("pause", true) => Some(ConsoleCommand::TogglePause),
        ("resume", true) => Some(ConsoleCommand::Resume),
        ("stop", true) => Some(ConsoleCommand::Stop),
        ("status", true) => Some(ConsoleCommand::Status),
        ("quit" | "exit", true) => Some(ConsoleCommand::Quit),
        ("set", false) => {
            let (key, value) = rest.split_once(char::is_whitespace)?;
            Some(ConsoleCommand::Set {
                key: key.to_string(),
                value: value.trim().to_string(),
            })
        }
        _ => None,
    }
}

/// Starts the stdin reader thread. The handle is returned for completeness;
/// the daemon drops it without joining.
pub fn spawn(tx: mpsc::UnboundedSender<DaemonEvent>) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("console-stdin".into())
        .spawn(move || pump(std::io::stdin().lock(), &tx))
}

/// Forwards each non-blank line of `reader` as a [`DaemonEvent`]. End of
/// input (or a read error) is treated as a shutdown request.
pub fn pump<R: BufRead>(reader: R, tx: &mpsc::UnboundedSender<DaemonEvent>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "console: failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let event = match parse_command(&line) {
            Some(cmd) => DaemonEvent::Command(cmd),
            None => DaemonEvent::UnknownCommand(line),
        };
        if tx.send(event).is_err() {
            return;
        }
    }

    let _ = tx.send(DaemonEvent::Shutdown);
}
