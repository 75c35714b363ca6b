/// Backup stage: full recursive copy of a source tree into a new
/// `backup_<timestamp>` directory under the target root.
///
/// The destination is created with `create_dir` (never `create_dir_all`), so
/// a second run within the same clock second fails with a collision error
/// instead of merging into the earlier backup. A target root inside the
/// source is refused up front.
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::stage::{Affected, StageName, StageResult};

const BACKUP_DIR_PREFIX: &str = "backup_";

/// What to do with a half-written destination when the copy fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialCopyPolicy {
    /// Leave whatever was copied in place for inspection.
    #[default]
    Keep,
    /// Remove the destination directory this run created.
    Remove,
}

/// Returns the current local time formatted as `YYYYMMDD_HHMMSS`.
fn local_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `<target_root>/backup_<timestamp>`.
pub fn destination_for(target_root: &Path, timestamp: &str) -> PathBuf {
    target_root.join(format!("{BACKUP_DIR_PREFIX}{timestamp}"))
}

/// Copies `source` into a freshly named directory under `target_root`.
pub fn backup(source: &Path, target_root: &Path, policy: PartialCopyPolicy) -> StageResult {
    let destination = destination_for(target_root, &local_timestamp());
    backup_into(source, &destination, policy)
}

/// Copies `source` into `destination`, which must not exist yet.
pub fn backup_into(source: &Path, destination: &Path, policy: PartialCopyPolicy) -> StageResult {
    if !source.is_dir() {
        warn!(source = %source.display(), "backup: source is not a directory");
        return StageResult::error(
            StageName::Backup,
            format!("source {} does not exist or is not a directory", source.display()),
        );
    }

    if let Some(parent) = destination.parent() {
        if let (Ok(src), Ok(root)) = (source.canonicalize(), parent.canonicalize()) {
            if root.starts_with(&src) {
                warn!(source = %src.display(), target = %root.display(), "backup: target inside source");
                return StageResult::error(
                    StageName::Backup,
                    format!("backup target {} is inside source {}", root.display(), src.display()),
                );
            }
        }
    }

    if let Err(e) = std::fs::create_dir(destination) {
        let detail = if e.kind() == std::io::ErrorKind::AlreadyExists {
            format!("destination {} already exists", destination.display())
        } else {
            format!("cannot create {}: {e}", destination.display())
        };
        warn!(dest = %destination.display(), error = %e, "backup: destination not created");
        return StageResult::error(StageName::Backup, detail);
    }

    match copy_tree(source, destination) {
        Ok(files) => {
            info!(
                source = %source.display(),
                dest = %destination.display(),
                files,
                "backup finished"
            );
            StageResult::success(
                StageName::Backup,
                format!("Backup complete: {}", destination.display()),
                Affected::Destination(destination.to_path_buf()),
            )
        }
        Err(e) => {
            let mut detail = format!("Backup failed: {e:#}");
            warn!(dest = %destination.display(), "backup: {detail}");
            if policy == PartialCopyPolicy::Remove {
                match std::fs::remove_dir_all(destination) {
                    Ok(()) => detail.push_str("; partial copy removed"),
                    Err(rm) => detail.push_str(&format!("; partial copy left in place ({rm})")),
                }
            }
            StageResult::error(StageName::Backup, detail)
        }
    }
}

/// Mirrors the tree under `source` into the existing directory `destination`.
/// Symlinks are followed, so linked files are copied by content.
/// Returns the number of files copied.
fn copy_tree(source: &Path, destination: &Path) -> Result<usize> {
    let mut files = 0;
    for entry in WalkDir::new(source).min_depth(1).follow_links(true) {
        let entry = entry.context("walking source tree")?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .context("entry outside of source tree")?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("creating {}", target.display()))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).with_context(|| {
                format!("copying {} to {}", entry.path().display(), target.display())
            })?;
            files += 1;
        } else {
            bail!("unsupported file type at {}", entry.path().display());
        }
    }
    Ok(files)
}
