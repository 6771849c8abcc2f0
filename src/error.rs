//! Error handling module for the installer
//!
//! Provides the typed error taxonomy used across the engine. Every phase function
//! returns `Result<T>` and propagates its first error with `?`; the orchestrator is
//! the single place where errors are caught, logged and reported.

use std::fmt;
use thiserror::Error;

/// Main error type for the installation engine
#[derive(Error, Debug)]
pub enum InstallError {
    /// A required input was missing or inconsistent. Detected before any external call.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// An external privileged tool exited with a non-zero status
    #[error("Command failed (exit code {code}): {command}\n{stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// An external tool could not be spawned because it is not installed
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors (file edits under the target root, spawning processes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Install state machine transition errors
    #[error("Install transition error: {0}")]
    InstallTransition(String),

    /// General errors (catch-all for edge cases)
    #[error("{0}")]
    General(String),
}

/// Result type alias for installer operations
pub type Result<T> = std::result::Result<T, InstallError>;

/// Coarse classification of an [`InstallError`].
///
/// The orchestrator treats all three kinds as fatal; the kind only decides the
/// log marker and lets callers tell bad input apart from a failing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    ExternalTool,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precondition => write!(f, "precondition"),
            Self::ExternalTool => write!(f, "external tool"),
            Self::Other => write!(f, "other"),
        }
    }
}

// Convenient error constructors
impl InstallError {
    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an install transition error
    pub fn install_transition(msg: impl Into<String>) -> Self {
        Self::InstallTransition(msg.into())
    }

    /// Create a general error
    pub fn general(msg: impl Into<String>) -> Self {
        Self::General(msg.into())
    }

    /// Classify this error for the orchestrator boundary
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Precondition(_) | Self::Config(_) => ErrorKind::Precondition,
            Self::CommandFailed { .. } | Self::CommandNotFound(_) => ErrorKind::ExternalTool,
            Self::Io(_) | Self::Json(_) | Self::InstallTransition(_) | Self::General(_) => {
                ErrorKind::Other
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InstallError::precondition("no root partition");
        assert_eq!(err.to_string(), "Precondition failed: no root partition");

        let err = InstallError::config("hostname must be specified");
        assert_eq!(
            err.to_string(),
            "Configuration error: hostname must be specified"
        );
    }

    #[test]
    fn test_command_failed_carries_command_and_stderr() {
        let err = InstallError::CommandFailed {
            command: "pacstrap -K /mnt base".to_string(),
            code: 1,
            stderr: "error: failed to synchronize all databases".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pacstrap -K /mnt base"));
        assert!(msg.contains("failed to synchronize"));
        assert!(msg.contains("exit code 1"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: InstallError = io_err.into();
        assert!(matches!(err, InstallError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            InstallError::precondition("x").kind(),
            ErrorKind::Precondition
        );
        assert_eq!(InstallError::config("x").kind(), ErrorKind::Precondition);
        assert_eq!(
            InstallError::CommandNotFound("parted".into()).kind(),
            ErrorKind::ExternalTool
        );
        assert_eq!(InstallError::general("x").kind(), ErrorKind::Other);
    }
}
