use thiserror::Error;

/// Errors that stop a run from being accepted.
///
/// Filesystem failures are deliberately absent: they are scoped to the stage
/// that produced them and travel inside [`StageResult`](crate::stage::StageResult).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    /// A run request field is missing or invalid. The run never starts.
    #[error("invalid run configuration: {0}")]
    Config(String),
    /// A run is already active for this controller.
    #[error("a run is already in progress")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_field() {
        let e = RunError::Config("Directory is empty".to_string());
        assert_eq!(e.to_string(), "invalid run configuration: Directory is empty");
    }

    #[test]
    fn busy_error_message() {
        assert_eq!(RunError::Busy.to_string(), "a run is already in progress");
    }
}
