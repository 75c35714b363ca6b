/// Canonical file paths for custodian data files.
///
/// Everything lives in one application directory, taken from
/// `$CUSTODIAN_HOME` or, when unset, the current working directory:
///   - config.toml  Run parameters, edited by hand or via `set`.
///   - status.toml  Written by the daemon for external viewers.
///   - logs/        Rotating log files.
use std::path::PathBuf;

pub const HOME_ENV_VAR: &str = "CUSTODIAN_HOME";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";
pub const LOG_DIR_NAME: &str = "logs";

/// Returns the application directory.
pub fn app_data_dir() -> PathBuf {
    match std::env::var_os(HOME_ENV_VAR) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("."),
    }
}

pub fn config_file_path() -> PathBuf {
    app_data_dir().join(CONFIG_FILE_NAME)
}

pub fn status_file_path() -> PathBuf {
    app_data_dir().join(STATUS_FILE_NAME)
}

pub fn log_dir() -> PathBuf {
    app_data_dir().join(LOG_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_path_has_correct_name() {
        let path = config_file_path();
        assert_eq!(path.file_name().unwrap(), CONFIG_FILE_NAME);
    }

    #[test]
    fn status_file_path_has_correct_name() {
        let path = status_file_path();
        assert_eq!(path.file_name().unwrap(), STATUS_FILE_NAME);
    }

    #[test]
    fn log_dir_has_correct_name() {
        assert_eq!(log_dir().file_name().unwrap(), LOG_DIR_NAME);
    }

    #[test]
    fn all_files_share_the_app_dir() {
        let config = config_file_path();
        let status = status_file_path();
        assert_eq!(config.parent(), status.parent());
        assert_eq!(config.parent(), log_dir().parent());
    }
}
