use crate::config::Config;
use crate::console::ConsoleCommand;
use crate::stage::RunEvent;

pub enum DaemonEvent {
    /// A line typed on the control console.
    Command(ConsoleCommand),
    /// The console saw input it could not parse.
    UnknownCommand(String),
    /// Forwarded from the active run's worker.
    Run(RunEvent),
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// Ctrl+C received or stdin closed; the daemon should stop the run and exit.
    Shutdown,
}
