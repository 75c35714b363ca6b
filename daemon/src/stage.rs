/// Values produced by a run and delivered to its [`EventSink`](crate::runner::EventSink).
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One of the two ordered maintenance operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    Cleanup,
    Backup,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageName::Cleanup => f.write_str("cleanup"),
            StageName::Backup => f.write_str("backup"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
    /// The stage never ran because the run was stopped first.
    Skipped,
}

/// What a stage touched: deleted file names for cleanup, the new
/// destination directory for backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affected {
    None,
    Files(Vec<String>),
    Destination(PathBuf),
}

/// Summary of a single stage. Partial failures inside a stage are folded into
/// `detail`; one stage produces exactly one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: StageName,
    pub outcome: Outcome,
    /// Human-readable text shown in the log view.
    pub detail: String,
    pub affected: Affected,
}

impl StageResult {
    pub fn success(stage: StageName, detail: impl Into<String>, affected: Affected) -> Self {
        Self { stage, outcome: Outcome::Success, detail: detail.into(), affected }
    }

    pub fn error(stage: StageName, detail: impl Into<String>) -> Self {
        Self { stage, outcome: Outcome::Error, detail: detail.into(), affected: Affected::None }
    }

    pub fn skipped(stage: StageName, detail: impl Into<String>) -> Self {
        Self { stage, outcome: Outcome::Skipped, detail: detail.into(), affected: Affected::None }
    }

    /// Names of deleted files, empty for anything other than a cleanup success.
    pub fn deleted_files(&self) -> &[String] {
        match &self.affected {
            Affected::Files(names) => names,
            _ => &[],
        }
    }

    pub fn destination(&self) -> Option<&PathBuf> {
        match &self.affected {
            Affected::Destination(path) => Some(path),
            _ => None,
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Both stages ran (each may have succeeded or failed independently).
    Completed,
    /// A stop request was observed at the checkpoint; backup never started.
    Stopped,
}

/// Everything an observer can be told about a run, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Stage(StageResult),
    /// The worker reached the checkpoint with pause requested and is waiting.
    Paused,
    /// The worker left the pause loop.
    Resumed,
    Finished(RunOutcome),
    /// A start request was refused; the payload explains why.
    Rejected(String),
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::Stage(r) => match r.outcome {
                Outcome::Success => write!(f, "[{}] {}", r.stage, r.detail),
                Outcome::Error => write!(f, "[{}] failed: {}", r.stage, r.detail),
                Outcome::Skipped => write!(f, "[{}] skipped: {}", r.stage, r.detail),
            },
            RunEvent::Paused => f.write_str("Run paused at checkpoint"),
            RunEvent::Resumed => f.write_str("Run resumed"),
            RunEvent::Finished(RunOutcome::Completed) => f.write_str("Run completed"),
            RunEvent::Finished(RunOutcome::Stopped) => f.write_str("Run stopped"),
            RunEvent::Rejected(reason) => write!(f, "Start rejected: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_files_only_for_file_lists() {
        let r = StageResult::success(
            StageName::Cleanup,
            "Deleted expired files: a.log",
            Affected::Files(vec!["a.log".to_string()]),
        );
        assert_eq!(r.deleted_files(), ["a.log".to_string()]);
        assert!(r.destination().is_none());

        let b = StageResult::success(
            StageName::Backup,
            "Backup complete",
            Affected::Destination(PathBuf::from("/dst/backup_20240101_000000")),
        );
        assert!(b.deleted_files().is_empty());
        assert_eq!(b.destination().unwrap(), &PathBuf::from("/dst/backup_20240101_000000"));
    }

    #[test]
    fn error_and_skipped_carry_no_affected_entries() {
        assert_eq!(StageResult::error(StageName::Cleanup, "boom").affected, Affected::None);
        assert_eq!(StageResult::skipped(StageName::Backup, "stopped").affected, Affected::None);
    }

    #[test]
    fn display_prefixes_stage_name() {
        let e = RunEvent::Stage(StageResult::error(StageName::Backup, "disk full"));
        assert_eq!(e.to_string(), "[backup] failed: disk full");

        let s = RunEvent::Stage(StageResult::skipped(StageName::Backup, "stopped"));
        assert_eq!(s.to_string(), "[backup] skipped: stopped");
    }

    #[test]
    fn terminal_events_display() {
        assert_eq!(RunEvent::Finished(RunOutcome::Completed).to_string(), "Run completed");
        assert_eq!(RunEvent::Finished(RunOutcome::Stopped).to_string(), "Run stopped");
    }
}
