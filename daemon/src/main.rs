mod backup;
mod config;
mod console;
mod controller;
mod error;
mod event;
mod logging;
mod paths;
mod purge;
mod runner;
mod signals;
mod stage;
mod status;

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::console::ConsoleCommand;
use crate::controller::TaskController;
use crate::event::DaemonEvent;
use crate::runner::EventSink;
use crate::stage::{Outcome, RunEvent};

/// The on-screen log: every run event becomes one stdout line and one
/// tracing record, then is handed to the event loop for status tracking.
struct ConsoleSink {
    tx: mpsc::UnboundedSender<DaemonEvent>,
}

impl EventSink for ConsoleSink {
    fn on_event(&self, event: &RunEvent) {
        println!("{event}");
        match event {
            RunEvent::Stage(r) if r.outcome == Outcome::Error => warn!(stage = %r.stage, "{}", r.detail),
            RunEvent::Rejected(reason) => warn!("start rejected: {reason}"),
            _ => info!("{event}"),
        }
        let _ = self.tx.send(DaemonEvent::Run(event.clone()));
    }
}

#[tokio::main]
async fn main() {
    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = paths::app_data_dir();
    if let Err(e) = std::fs::create_dir_all(&app_dir) {
        eprintln!("Failed to create app data directory {}: {e}", app_dir.display());
        std::process::exit(1);
    }

    // ── Logging ───────────────────────────────────────────────────────────────
    let _log_guard = match logging::init(&paths::log_dir()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialise logging: {e:#}");
            std::process::exit(1);
        }
    };

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = paths::config_file_path();
    let mut config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        error!("config: {e:#}; using defaults");
        config::Config::default()
    });

    // ── Initial status ────────────────────────────────────────────────────────
    let status_path = paths::status_file_path();
    let mut current_status = status::DaemonStatus::new();
    status::write_status(&status_path, &current_status);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<DaemonEvent>();

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path.clone(), event_tx.clone()));
    // Not joined: the thread may stay blocked in a stdin read until exit.
    if let Err(e) = console::spawn(event_tx.clone()) {
        error!(error = %e, "console: failed to start stdin reader");
    }

    // Graceful shutdown on the first Ctrl+C, immediate exit on the second.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            let _ = tx.send(DaemonEvent::Shutdown);
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupted again; exiting without waiting for the run");
                std::process::exit(130);
            }
        });
    }

    let sink = Arc::new(ConsoleSink { tx: event_tx.clone() });
    let mut controller = TaskController::new(sink, config.runner.options());

    info!(version = env!("CARGO_PKG_VERSION"), dir = %app_dir.display(), "custodian started");
    println!("{}", console::USAGE);

    // ── Event loop ────────────────────────────────────────────────────────────
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::Command(ConsoleCommand::Start) => {
                let request = match config.tasks.to_run_request() {
                    Ok(request) => request,
                    Err(e) => {
                        println!("{e}");
                        error!(error = %e, "start refused");
                        current_status.error = Some(e.to_string());
                        status::write_status(&status_path, &current_status);
                        continue;
                    }
                };
                // Busy is reported through the sink as a Rejected event.
                if controller.start(request).is_ok() {
                    current_status.run_started();
                    status::write_status(&status_path, &current_status);
                }
            }

            DaemonEvent::Command(ConsoleCommand::TogglePause) => match controller.toggle_pause() {
                Some(true) => println!("Pause requested; the run halts at its next checkpoint"),
                Some(false) if controller.is_stopping() => println!("Run is stopping"),
                Some(false) => println!("Resume requested"),
                None => println!("No active run"),
            },

            DaemonEvent::Command(ConsoleCommand::Resume) => {
                if controller.resume() {
                    println!("Resume requested");
                } else {
                    println!("No active run");
                }
            }

            DaemonEvent::Command(ConsoleCommand::Stop) => {
                if controller.stop() {
                    println!("Stop requested; the run ends at its next checkpoint");
                    current_status.state = status::DaemonState::Stopping;
                    status::write_status(&status_path, &current_status);
                } else {
                    println!("No active run");
                }
            }

            DaemonEvent::Command(ConsoleCommand::Status) => println!("{}", current_status.summary()),

            DaemonEvent::Command(ConsoleCommand::Set { key, value }) => {
                if let Err(e) = config.tasks.set(&key, &value) {
                    println!("{e}");
                    continue;
                }
                match config::save(&config_path, &config) {
                    Ok(()) => println!("{key} = {value}"),
                    Err(e) => {
                        println!("Failed to save config: {e:#}");
                        error!("config: save failed: {e:#}");
                    }
                }
            }

            DaemonEvent::Command(ConsoleCommand::Quit) | DaemonEvent::Shutdown => {
                info!("shutting down");
                match controller.shutdown().await {
                    Ok(Some(outcome)) => info!(?outcome, "final run ended"),
                    Ok(None) => {}
                    Err(e) => error!("run worker failed: {e:#}"),
                }
                break;
            }

            DaemonEvent::UnknownCommand(line) => {
                println!("Unknown command '{}'; {}", line.trim(), console::USAGE);
            }

            DaemonEvent::Run(run_event) => {
                current_status.apply(&run_event);
                if controller.is_stopping() && current_status.state == status::DaemonState::Running {
                    current_status.state = status::DaemonState::Stopping;
                }
                status::write_status(&status_path, &current_status);
            }

            DaemonEvent::ConfigReloaded(new_config) => {
                info!("config reloaded");
                // Only runs started from now on see the new values.
                controller.set_options(new_config.runner.options());
                config = new_config;
            }
        }
    }

    // Drain events the final run emitted while we were waiting on it.
    while let Ok(evt) = event_rx.try_recv() {
        if let DaemonEvent::Run(run_event) = evt {
            current_status.apply(&run_event);
        }
    }
    current_status.state = status::DaemonState::Idle;
    status::write_status(&status_path, &current_status);
}
