//! Terminal Session Model
//!
//! Represents one pooled terminal session known to a host. The pool owns the
//! session's status; command processes only report back through lifecycle
//! hooks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::host::HostHandle;

/// Opaque, registry-assigned session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw identifier
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Busy state of a session as tracked by the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Ready to accept a command
    #[default]
    Idle,
    /// Running exactly one command
    Busy,
    /// Last command ended with a host stream error; the foreground
    /// process may still be attached
    Faulted,
}

/// A reusable terminal session
#[derive(Debug, Clone)]
pub struct TerminalSession {
    /// Session identifier
    pub id: SessionId,

    /// Working directory as last known to the pool
    pub working_directory: PathBuf,

    /// Current status
    pub status: SessionStatus,

    /// Last command dispatched to this session (diagnostic only)
    pub last_command: Option<String>,

    /// When the session was provisioned
    pub created_at: DateTime<Utc>,

    /// When the last command was dispatched
    pub last_used: Option<DateTime<Utc>>,

    /// Host-side handle, opaque to the pool
    pub host_handle: HostHandle,
}

impl TerminalSession {
    /// Create a new idle session
    pub fn new(id: SessionId, working_directory: impl AsRef<Path>, host_handle: HostHandle) -> Self {
        Self {
            id,
            working_directory: working_directory.as_ref().to_path_buf(),
            status: SessionStatus::Idle,
            last_command: None,
            created_at: Utc::now(),
            last_used: None,
            host_handle,
        }
    }

    /// Check if the session can take a new command
    pub fn is_idle(&self) -> bool {
        self.status == SessionStatus::Idle
    }

    /// Busy and faulted sessions both count as busy for listing purposes
    pub fn is_busy(&self) -> bool {
        !self.is_idle()
    }

    /// Mark the session busy with `command`
    pub fn mark_busy(&mut self, command: &str) {
        self.status = SessionStatus::Busy;
        self.last_command = Some(command.to_string());
        self.last_used = Some(Utc::now());
    }

    /// Mark the session idle again
    pub fn mark_idle(&mut self) {
        self.status = SessionStatus::Idle;
    }

    /// Mark the session as being in an uncertain state
    pub fn mark_faulted(&mut self) {
        self.status = SessionStatus::Faulted;
    }

    /// Listing view of this session
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            last_command: self.last_command.clone(),
        }
    }
}

/// Listing entry returned by the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub last_command: Option<String>,
}
