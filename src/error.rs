//! Error types for NoTrack.

use thiserror::Error;

/// Fatal conditions that abort a run with a distinct exit status.
///
/// Everything that is not listed here is either recoverable (logged and
/// skipped) or reported with the generic exit status 1.
#[derive(Error, Debug)]
pub enum NotrackError {
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Unable to create working directory {0}")]
    WorkingDirectory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown processing method '{method}' for source '{source_name}'")]
    UnknownMethod { source_name: String, method: String },
}

impl NotrackError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            NotrackError::WorkingDirectory(_) => 2,
            NotrackError::Config(_) => 3,
            NotrackError::Permission(_) => 5,
            NotrackError::UnknownMethod { .. } => 7,
        }
    }
}

/// Pick the exit status for an error chain, falling back to 1.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<NotrackError>())
        .map(NotrackError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            NotrackError::Permission(String::new()).exit_code(),
            NotrackError::WorkingDirectory(String::new()).exit_code(),
            NotrackError::Config(String::new()).exit_code(),
            NotrackError::UnknownMethod {
                source_name: "x".into(),
                method: "y".into(),
            }
            .exit_code(),
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
        assert!(!codes.contains(&1));
    }

    #[test]
    fn test_exit_code_found_through_context() {
        let err = Err::<(), _>(NotrackError::Permission("root".into()))
            .context("while starting")
            .unwrap_err();
        assert_eq!(exit_code_for(&err), 5);
    }

    #[test]
    fn test_exit_code_generic() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&err), 1);
    }

    #[test]
    fn test_unknown_method_message() {
        let err = NotrackError::UnknownMethod {
            source_name: "easylist".into(),
            method: "fancy".into(),
        };
        assert!(err.to_string().contains("fancy"));
        assert!(err.to_string().contains("easylist"));
    }
}
