/// Thin control surface over [`TaskRunner`]: start, pause/resume, stop.
///
/// The controller never touches the filesystem; it only creates a fresh
/// [`ControlSignals`] per run and flips its flags.
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::RunError;
use crate::runner::{EventSink, RunHandle, RunRequest, RunnerOptions, TaskRunner};
use crate::signals::ControlSignals;
use crate::stage::{RunEvent, RunOutcome};

struct ActiveRun {
    signals: ControlSignals,
    handle: RunHandle,
}

pub struct TaskController {
    sink: Arc<dyn EventSink>,
    options: RunnerOptions,
    active: Option<ActiveRun>,
}

impl TaskController {
    pub fn new(sink: Arc<dyn EventSink>, options: RunnerOptions) -> Self {
        Self { sink, options, active: None }
    }

    /// Options for runs started after this call. The active run keeps the
    /// options it was started with.
    pub fn set_options(&mut self, options: RunnerOptions) {
        self.options = options;
    }

    /// True while a worker has not yet reached a terminal state.
    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(|run| !run.handle.is_finished())
    }

    /// Spawns a new run. Refused with [`RunError::Busy`] (and a `Rejected`
    /// event) if the previous run is still going.
    pub fn start(&mut self, request: RunRequest) -> Result<(), RunError> {
        if self.is_active() {
            warn!("start refused: run already active");
            self.sink.on_event(&RunEvent::Rejected(RunError::Busy.to_string()));
            return Err(RunError::Busy);
        }

        let signals = ControlSignals::new();
        let handle =
            TaskRunner::new(request, signals.clone(), Arc::clone(&self.sink), self.options).spawn();
        self.active = Some(ActiveRun { signals, handle });
        info!("run spawned");
        Ok(())
    }

    /// Flips pause on the active run. Returns the new paused state, or `None`
    /// when there is nothing to pause. Once stopped this always reports `false`.
    pub fn toggle_pause(&self) -> Option<bool> {
        let run = self.running()?;
        if run.signals.is_paused() {
            run.signals.request_resume();
        } else {
            run.signals.request_pause();
        }
        let paused = run.signals.is_paused();
        info!(paused, "pause toggled");
        Some(paused)
    }

    pub fn resume(&self) -> bool {
        match self.running() {
            Some(run) => {
                run.signals.request_resume();
                true
            }
            None => false,
        }
    }

    /// Requests a cooperative stop. Returns `false` if no run is active.
    pub fn stop(&self) -> bool {
        match self.running() {
            Some(run) => {
                run.signals.request_stop();
                info!("stop requested");
                true
            }
            None => false,
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.running().is_some_and(|run| run.signals.is_stopped())
    }

    /// Waits for the current run, if any, and clears it.
    pub async fn wait(&mut self) -> Result<Option<RunOutcome>> {
        match self.active.take() {
            Some(run) => Ok(Some(run.handle.wait().await?)),
            None => Ok(None),
        }
    }

    /// Stops the active run, if any, and waits for it to end at its
    /// checkpoint. A stage already in progress finishes first.
    pub async fn shutdown(&mut self) -> Result<Option<RunOutcome>> {
        if self.stop() {
            info!("waiting for the active run to reach its checkpoint");
        }
        self.wait().await
    }

    fn running(&self) -> Option<&ActiveRun> {
        self.active.as_ref().filter(|run| !run.handle.is_finished())
    }
}
