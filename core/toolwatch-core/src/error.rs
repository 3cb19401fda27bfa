//! Error types for toolwatch-core operations.

use std::path::PathBuf;

/// All errors that can occur in toolwatch-core operations.
///
/// Sampling and detection problems never reach callers as errors; they are
/// logged and degrade to safe defaults. Request-level operations (switch,
/// kill) return these variants so callers can act on them.
#[derive(Debug, thiserror::Error)]
pub enum ToolwatchError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file not found: {0}")]
    ConfigMissing(PathBuf),

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Engine config invalid: {path}: {details}")]
    Config { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Scenario Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Scenario switch failed: {reason}")]
    SwitchFailed {
        reason: SwitchFailureReason,
        stdout: String,
        stderr: String,
    },

    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Process Control Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("No such process: {0}")]
    ProcessNotFound(u32),

    #[error("Permission denied signalling process {0}")]
    PermissionDenied(u32),

    #[error("Invalid pid: {0}")]
    InvalidPid(String),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why an external switch command did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchFailureReason {
    ExitCode(i32),
    Signaled,
    TimedOut { after_secs: u64 },
}

impl std::fmt::Display for SwitchFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwitchFailureReason::ExitCode(code) => write!(f, "exit code {}", code),
            SwitchFailureReason::Signaled => write!(f, "terminated by signal"),
            SwitchFailureReason::TimedOut { after_secs } => {
                write!(f, "timed out after {} s", after_secs)
            }
        }
    }
}

impl ToolwatchError {
    /// Stable machine-readable code, used on the IPC wire.
    pub fn code(&self) -> &'static str {
        match self {
            ToolwatchError::ConfigMissing(_) => "config_missing",
            ToolwatchError::ConfigMalformed { .. } => "config_malformed",
            ToolwatchError::Config { .. } => "config_invalid",
            ToolwatchError::UnknownScenario(_) => "unknown_scenario",
            ToolwatchError::SwitchFailed { .. } => "switch_failed",
            ToolwatchError::CommandFailed { .. } => "command_failed",
            ToolwatchError::ProcessNotFound(_) => "process_not_found",
            ToolwatchError::PermissionDenied(_) => "permission_denied",
            ToolwatchError::InvalidPid(_) => "invalid_pid",
            ToolwatchError::Io { .. } => "io_error",
        }
    }
}

/// Convenience type alias for Results using ToolwatchError.
pub type Result<T> = std::result::Result<T, ToolwatchError>;

impl From<ToolwatchError> for String {
    fn from(err: ToolwatchError) -> String {
        err.to_string()
    }
}
