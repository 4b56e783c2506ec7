//! Error types and Result aliases for termpool

use std::path::PathBuf;

use crate::models::SessionId;

/// Result type alias for termpool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for termpool
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // === Session errors ===
    /// Session is not known to the registry or the pool
    #[error("Session {session_id} not found")]
    SessionNotFound { session_id: SessionId },

    /// Session is already running a command (or is in an uncertain state)
    #[error("Session {session_id} is busy running '{last_command}'")]
    SessionBusy {
        session_id: SessionId,
        last_command: String,
    },

    // === Host errors ===
    /// The host refused to start structured execution
    #[error("Failed to execute '{command}' on session {session_id}: {reason}")]
    HostExecutionFailed {
        session_id: SessionId,
        command: String,
        reason: String,
    },

    /// The host output stream failed mid-command
    #[error("Output stream for '{command}' failed: {reason}")]
    HostStreamFailed { command: String, reason: String },

    /// Plain text injection failed
    #[error("Failed to send text to session {session_id}: {reason}")]
    SendTextFailed {
        session_id: SessionId,
        reason: String,
    },

    /// The process task went away without resolving its completion
    #[error("Command '{command}' was aborted before completing")]
    ProcessAborted { command: String },

    // === PTY errors ===
    /// Failed to create PTY
    #[error("Failed to create PTY for command '{command}': {reason}")]
    PtyCreationFailed { command: String, reason: String },

    /// Failed to spawn command in PTY
    #[error("Failed to spawn command '{command}': {reason}")]
    CommandSpawnFailed { command: String, reason: String },

    /// Failed to clone PTY reader
    #[error("Failed to clone PTY reader: {reason}")]
    PtyReaderCloneFailed { reason: String },

    // === Configuration errors ===
    /// Failed to load configuration file
    #[error("Failed to load config from '{}': {reason}", path.display())]
    ConfigLoadFailed { path: PathBuf, reason: String },

    /// Failed to parse configuration
    #[error("Failed to parse {format} config: {reason}")]
    ConfigParseFailed { format: String, reason: String },

    /// Configuration validation failed
    #[error("Configuration validation failed for '{field}': {reason}")]
    ConfigValidationFailed { field: String, reason: String },

    // === I/O and serialization errors ===
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    // === Generic fallback (use sparingly) ===
    /// Generic errors (for cases not yet categorized)
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Whether the error came from the terminal host rather than from pool bookkeeping
    pub fn is_host_error(&self) -> bool {
        matches!(
            self,
            Error::HostExecutionFailed { .. }
                | Error::HostStreamFailed { .. }
                | Error::SendTextFailed { .. }
                | Error::PtyCreationFailed { .. }
                | Error::CommandSpawnFailed { .. }
                | Error::PtyReaderCloneFailed { .. }
        )
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Other(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::Other(err.to_string())
    }
}
