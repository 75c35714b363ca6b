/// Cleanup stage: delete regular files older than a threshold from a single
/// directory (non-recursive).
use std::path::Path;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::stage::{Affected, StageName, StageResult};

const SECS_PER_DAY: f64 = 86_400.0;

/// Deletes every regular file directly under `directory` whose age exceeds
/// `threshold_days`.
///
/// Age is measured against a single `now` captured before the listing.
/// Symlinks, subdirectories and entries whose metadata cannot be read are
/// left alone. A failed deletion is recorded in the result detail and the
/// loop moves on; only an unlistable directory turns into an `Error` result.
pub fn purge_older_than(directory: &Path, threshold_days: u32) -> StageResult {
    purge_with(directory, threshold_days, |path| std::fs::remove_file(path))
}

/// `purge_older_than` with the deletion call supplied by the caller.
fn purge_with<F>(directory: &Path, threshold_days: u32, remove: F) -> StageResult
where
    F: Fn(&Path) -> std::io::Result<()>,
{
    let now = SystemTime::now();

    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %directory.display(), error = %e, "cleanup: cannot list directory");
            return StageResult::error(
                StageName::Cleanup,
                format!("cannot list {}: {e}", directory.display()),
            );
        }
    };

    let mut deleted = Vec::new();
    let mut failures = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "cleanup: skipping unreadable entry");
                continue;
            }
        };

        // `DirEntry::file_type` does not follow symlinks.
        match entry.file_type() {
            Ok(ft) if ft.is_file() => {}
            _ => continue,
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "cleanup: no mtime, skipping");
                continue;
            }
        };

        if !is_expired(now, modified, threshold_days) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        match remove(&entry.path()) {
            Ok(()) => deleted.push(name),
            Err(e) => {
                warn!(file = %name, error = %e, "cleanup: delete failed");
                failures.push(format!("{name} ({e})"));
            }
        }
    }

    let mut detail = if deleted.is_empty() && failures.is_empty() {
        "No expired files, nothing to delete".to_string()
    } else if deleted.is_empty() {
        "No expired files deleted".to_string()
    } else {
        format!("Deleted expired files: {}", deleted.join(", "))
    };
    if !failures.is_empty() {
        detail.push_str(&format!("; could not delete: {}", failures.join(", ")));
    }

    info!(dir = %directory.display(), deleted = deleted.len(), failed = failures.len(), "cleanup finished");
    StageResult::success(StageName::Cleanup, detail, Affected::Files(deleted))
}

/// A file modified in the future has no measurable age and never expires.
fn is_expired(now: SystemTime, modified: SystemTime, threshold_days: u32) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age.as_secs_f64() / SECS_PER_DAY > f64::from(threshold_days),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Outcome;
    use std::time::Duration;

    const DAY: Duration = Duration::from_secs(86_400);

    fn write_aged(dir: &Path, name: &str, age: Duration) {
        let path = dir.join(name);
        std::fs::write(&path, b"data").unwrap();
        let f = std::fs::File::options().write(true).open(&path).unwrap();
        f.set_modified(SystemTime::now() - age).unwrap();
    }

    // ── is_expired ────────────────────────────────────────────────────────────

    #[test]
    fn is_expired_strictly_greater_than_threshold() {
        let now = SystemTime::now();
        assert!(is_expired(now, now - DAY * 8, 7));
        assert!(!is_expired(now, now - DAY * 6, 7));
        assert!(!is_expired(now, now - DAY * 7, 7));
    }

    #[test]
    fn is_expired_zero_threshold_takes_any_age() {
        let now = SystemTime::now();
        assert!(is_expired(now, now - Duration::from_secs(1), 0));
        assert!(!is_expired(now, now, 0));
    }

    #[test]
    fn is_expired_future_mtime_never_expires() {
        let now = SystemTime::now();
        assert!(!is_expired(now, now + DAY, 0));
    }

    // ── purge_older_than ──────────────────────────────────────────────────────

    #[test]
    fn deletes_only_files_past_threshold() {
        let dir = tempfile::tempdir().unwrap();
        write_aged(dir.path(), "old.log", DAY * 10);
        write_aged(dir.path(), "new.log", DAY * 2);

        let result = purge_older_than(dir.path(), 7);

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.deleted_files(), ["old.log".to_string()]);
        assert!(!dir.path().join("old.log").exists());
        assert!(dir.path().join("new.log").exists());
        assert!(result.detail.contains("old.log"));
    }

    #[test]
    fn empty_directory_reports_nothing_to_delete() {
        let dir = tempfile::tempdir().unwrap();
        let result = purge_older_than(dir.path(), 7);
        assert_eq!(result.outcome, Outcome::Success);
        assert!(result.deleted_files().is_empty());
        assert!(result.detail.contains("nothing to delete"), "{}", result.detail);
    }

    #[test]
    fn missing_directory_is_an_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let result = purge_older_than(&dir.path().join("absent"), 7);
        assert_eq!(result.outcome, Outcome::Error);
        assert!(result.detail.contains("absent"));
    }

    #[test]
    fn subdirectories_are_not_touched_or_recursed() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        write_aged(&sub, "deep.log", DAY * 30);

        let result = purge_older_than(dir.path(), 1);

        assert!(result.deleted_files().is_empty());
        assert!(sub.join("deep.log").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        write_aged(outside.path(), "target.log", DAY * 30);
        std::os::unix::fs::symlink(outside.path().join("target.log"), dir.path().join("link.log"))
            .unwrap();

        let result = purge_older_than(dir.path(), 1);

        assert!(result.deleted_files().is_empty());
        assert!(dir.path().join("link.log").symlink_metadata().is_ok());
        assert!(outside.path().join("target.log").exists());
    }

    #[test]
    fn failed_deletion_is_reported_and_the_rest_continue() {
        let dir = tempfile::tempdir().unwrap();
        write_aged(dir.path(), "stuck.log", DAY * 10);
        write_aged(dir.path(), "old.log", DAY * 10);
        write_aged(dir.path(), "new.log", DAY);

        let result = purge_with(dir.path(), 7, |path| {
            if path.file_name().is_some_and(|n| n == "stuck.log") {
                Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"))
            } else {
                std::fs::remove_file(path)
            }
        });

        assert_eq!(result.outcome, Outcome::Success, "{}", result.detail);
        assert_eq!(result.deleted_files(), ["old.log".to_string()]);
        assert!(!dir.path().join("old.log").exists());
        assert!(dir.path().join("stuck.log").exists());
        assert!(dir.path().join("new.log").exists());
        assert!(result.detail.contains("Deleted expired files: old.log"), "{}", result.detail);
        assert!(result.detail.contains("could not delete: stuck.log (locked)"), "{}", result.detail);
    }

    #[test]
    fn only_failed_deletions_still_succeed() {
        let dir = tempfile::tempdir().unwrap();
        write_aged(dir.path(), "stuck.log", DAY * 10);

        let result = purge_with(dir.path(), 7, |_| {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"))
        });

        assert_eq!(result.outcome, Outcome::Success);
        assert!(result.deleted_files().is_empty());
        assert!(result.detail.starts_with("No expired files deleted"), "{}", result.detail);
        assert!(!result.detail.contains("nothing to delete"), "{}", result.detail);
        assert!(result.detail.contains("stuck.log"), "{}", result.detail);
    }

    #[test]
    fn remaining_files_are_within_threshold() {
        let dir = tempfile::tempdir().unwrap();
        for (i, days) in [1u32, 3, 5, 9, 12, 40].iter().enumerate() {
            write_aged(dir.path(), &format!("f{i}.txt"), DAY * *days);
        }

        let result = purge_older_than(dir.path(), 4);

        assert_eq!(result.deleted_files().len(), 4);
        for name in result.deleted_files() {
            assert!(!dir.path().join(name).exists());
        }
        let now = SystemTime::now();
        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let modified = entry.unwrap().metadata().unwrap().modified().unwrap();
            assert!(!is_expired(now, modified, 4));
        }
    }
}
