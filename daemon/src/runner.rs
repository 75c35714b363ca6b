/// The maintenance pipeline for a single run.
///
/// A run executes cleanup, then a checkpoint, then backup, on one spawned
/// worker task:
///
/// ```text
/// Idle -> Running(Cleanup) -> CheckPoint -> Running(Backup) -> Completed
///                                  |
///                                  +-> Stopped
/// ```
///
/// Pause and stop are only honoured at the checkpoint. A stage that has
/// started always runs to completion or failure; its blocking filesystem work
/// is moved onto [`tokio::task::spawn_blocking`] so the runtime stays free.
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::backup::{self, PartialCopyPolicy};
use crate::error::RunError;
use crate::purge;
use crate::signals::ControlSignals;
use crate::stage::{RunEvent, RunOutcome, StageName, StageResult};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Receives run events. Called synchronously on the worker; implementations
/// that drive a UI must hand the event off to their own thread.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

/// Validated parameters for one run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    target_directory: PathBuf,
    expiration_days: u32,
    backup_source: PathBuf,
    backup_target: PathBuf,
}

impl RunRequest {
    /// Rejects empty paths with [`RunError::Config`].
    pub fn new(
        target_directory: impl Into<PathBuf>,
        expiration_days: u32,
        backup_source: impl Into<PathBuf>,
        backup_target: impl Into<PathBuf>,
    ) -> Result<Self, RunError> {
        let request = Self {
            target_directory: target_directory.into(),
            expiration_days,
            backup_source: backup_source.into(),
            backup_target: backup_target.into(),
        };
        for (key, path) in [
            ("Directory", &request.target_directory),
            ("BackupSource", &request.backup_source),
            ("BackupTarget", &request.backup_target),
        ] {
            if path.as_os_str().is_empty() {
                return Err(RunError::Config(format!("{key} is empty")));
            }
        }
        Ok(request)
    }

    pub fn target_directory(&self) -> &PathBuf {
        &self.target_directory
    }

    pub fn expiration_days(&self) -> u32 {
        self.expiration_days
    }

    pub fn backup_source(&self) -> &PathBuf {
        &self.backup_source
    }

    pub fn backup_target(&self) -> &PathBuf {
        &self.backup_target
    }
}

/// Tunables that are not part of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    /// How often a paused worker re-checks its signals.
    pub poll_interval: Duration,
    pub partial_copy: PartialCopyPolicy,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            partial_copy: PartialCopyPolicy::Keep,
        }
    }
}

/// Owns everything a worker needs for one run.
pub struct TaskRunner {
    request: RunRequest,
    signals: ControlSignals,
    sink: Arc<dyn EventSink>,
    options: RunnerOptions,
}

/// Join handle for a spawned run.
pub struct RunHandle {
    handle: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker to reach a terminal state.
    pub async fn wait(self) -> Result<RunOutcome> {
        self.handle
            .await
            .map_err(|e| anyhow::anyhow!("Run worker panicked: {e}"))
    }
}

impl TaskRunner {
    pub fn new(
        request: RunRequest,
        signals: ControlSignals,
        sink: Arc<dyn EventSink>,
        options: RunnerOptions,
    ) -> Self {
        Self { request, signals, sink, options }
    }

    /// Starts the run on its own task. Must be called inside a Tokio runtime.
    pub fn spawn(self) -> RunHandle {
        RunHandle { handle: tokio::spawn(self.run()) }
    }

    /// Drives the run to a terminal state on the current task.
    pub async fn run(self) -> RunOutcome {
        info!(
            dir = %self.request.target_directory().display(),
            days = self.request.expiration_days(),
            source = %self.request.backup_source().display(),
            target = %self.request.backup_target().display(),
            "run started"
        );

        let cleanup = {
            let dir = self.request.target_directory.clone();
            let days = self.request.expiration_days;
            run_stage(StageName::Cleanup, move || purge::purge_older_than(&dir, days)).await
        };
        self.emit(RunEvent::Stage(cleanup));

        if !self.checkpoint().await {
            self.emit(RunEvent::Stage(StageResult::skipped(StageName::Backup, "stopped")));
            return self.finish(RunOutcome::Stopped);
        }

        let backup = {
            let source = self.request.backup_source.clone();
            let target = self.request.backup_target.clone();
            let policy = self.options.partial_copy;
            run_stage(StageName::Backup, move || backup::backup(&source, &target, policy)).await
        };
        self.emit(RunEvent::Stage(backup));

        self.finish(RunOutcome::Completed)
    }

    /// Waits out a pause without busy-spinning. Returns `false` if the run
    /// must stop instead of continuing to the next stage.
    async fn checkpoint(&self) -> bool {
        if self.signals.is_paused() {
            info!("run paused at checkpoint");
            self.emit(RunEvent::Paused);
            while self.signals.is_paused() {
                tokio::time::sleep(self.options.poll_interval).await;
                if self.signals.is_stopped() {
                    break;
                }
            }
            if !self.signals.is_stopped() {
                info!("run resumed");
                self.emit(RunEvent::Resumed);
            }
        }
        !self.signals.is_stopped()
    }

    fn finish(&self, outcome: RunOutcome) -> RunOutcome {
        info!(?outcome, "run finished");
        self.emit(RunEvent::Finished(outcome));
        outcome
    }

    fn emit(&self, event: RunEvent) {
        self.sink.on_event(&event);
    }
}

/// Runs a blocking stage body off the async workers. A panic inside the
/// body becomes that stage's error result.
async fn run_stage<F>(stage: StageName, body: F) -> StageResult
where
    F: FnOnce() -> StageResult + Send + 'static,
{
    match tokio::task::spawn_blocking(body).await {
        Ok(result) => result,
        Err(e) => {
            error!(%stage, error = %e, "stage task panicked");
            StageResult::error(stage, format!("stage aborted: {e}"))
        }
    }
}
