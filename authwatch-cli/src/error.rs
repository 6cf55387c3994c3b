//! CLI-specific error types and exit code mapping

use authwatch_core::error::{AuthwatchError, StorageError};
use authwatch_log_pipeline::LogPipelineError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The data directory cannot be read or written (daemon state missing,
    /// permissions, corrupt ledgers).
    #[error("data directory not reachable: {0}")]
    DataUnreachable(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                  |
    /// |------|--------------------------|
    /// | 0    | Success                  |
    /// | 1    | General / command error  |
    /// | 2    | Configuration error      |
    /// | 3    | Data dir not reachable   |
    /// | 10   | IO error                 |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::DataUnreachable(_) => 3,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<AuthwatchError> for CliError {
    fn from(e: AuthwatchError) -> Self {
        match e {
            AuthwatchError::Config(inner) => Self::Config(inner.to_string()),
            AuthwatchError::Storage(inner) => Self::DataUnreachable(inner.to_string()),
            AuthwatchError::Io(inner) => Self::Io(inner),
            other => Self::Command(other.to_string()),
        }
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        Self::DataUnreachable(e.to_string())
    }
}

impl From<LogPipelineError> for CliError {
    fn from(e: LogPipelineError) -> Self {
        match e {
            LogPipelineError::Storage(inner) => Self::DataUnreachable(inner.to_string()),
            // pipeline config errors surface field names from authwatch.toml
            config @ LogPipelineError::Config { .. } => Self::Config(config.to_string()),
            other => Self::Command(other.to_string()),
        }
    }
}
