use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::stage::{Outcome, RunEvent, RunOutcome, StageName};

/// Current operational state of the daemon.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DaemonState {
    /// No run is active.
    Idle,
    /// A run is executing a stage or passing its checkpoint.
    Running,
    /// The active run is waiting at its checkpoint.
    Paused,
    /// Stop was requested; the run will end at its next checkpoint.
    Stopping,
}

/// Runtime status written by the daemon to `status.toml`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DaemonStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    /// Current operational state.
    pub state: DaemonState,
    /// How the most recent run ended, if one has finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<RunOutcome>,
    /// RFC 3339 timestamp of the most recent run's end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_finished: Option<String>,
    /// Number of files the most recent successful cleanup deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cleanup_deleted: Option<usize>,
    /// Destination directory of the most recent successful backup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup_path: Option<String>,
    /// Most recent stage failure or rejected start, cleared when a new run starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonStatus {
    /// Constructs the initial idle status on daemon startup.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: DaemonState::Idle,
            last_outcome: None,
            last_run_finished: None,
            last_cleanup_deleted: None,
            last_backup_path: None,
            error: None,
        }
    }

    /// Marks a freshly started run.
    pub fn run_started(&mut self) {
        self.state = DaemonState::Running;
        self.error = None;
    }

    /// Folds a run event into the status.
    pub fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Stage(result) => match result.outcome {
                Outcome::Error => self.error = Some(format!("{}: {}", result.stage, result.detail)),
                Outcome::Success if result.stage == StageName::Cleanup => {
                    self.last_cleanup_deleted = Some(result.deleted_files().len());
                }
                Outcome::Success if result.stage == StageName::Backup => {
                    self.last_backup_path = result
                        .destination()
                        .map(|p| p.to_string_lossy().into_owned());
                }
                _ => {}
            },
            RunEvent::Paused => self.state = DaemonState::Paused,
            RunEvent::Resumed => self.state = DaemonState::Running,
            RunEvent::Finished(outcome) => {
                self.state = DaemonState::Idle;
                self.last_outcome = Some(*outcome);
                self.last_run_finished = Some(chrono::Local::now().to_rfc3339());
            }
            RunEvent::Rejected(reason) => self.error = Some(reason.clone()),
        }
    }

    /// One-line summary for the console.
    pub fn summary(&self) -> String {
        let mut line = format!("state: {:?}", self.state).to_lowercase();
        if let Some(outcome) = self.last_outcome {
            line.push_str(&format!(", last run: {outcome:?}").to_lowercase());
        }
        if let Some(path) = &self.last_backup_path {
            line.push_str(&format!(", last backup: {path}"));
        }
        if let Some(error) = &self.error {
            line.push_str(&format!(", error: {error}"));
        }
        line
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Failures are logged and swallowed; a status write never stops the daemon.
pub fn write_status(path: &Path, status: &DaemonStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(dir = %parent.display(), error = %e, "status: failed to create directory");
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                warn!(error = %e, "status: failed to write status file");
            }
        }
        Err(e) => warn!(error = %e, "status: failed to serialize status"),
    }
}
