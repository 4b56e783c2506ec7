//! Terminal Host Abstraction
//!
//! The terminal host owns the actual shells. termpool only talks to it
//! through [`TerminalHost`], which lets the pool run against an editor's
//! terminal API, the bundled [`crate::pty::PtyHost`], or a scripted host in
//! tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Chunks of decoded terminal output, in the order the host produced them
pub type OutputStream = BoxStream<'static, Result<String>>;

/// Opaque reference to a host-side terminal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostHandle(String);

impl HostHandle {
    /// Create a handle from a host-chosen identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The host-chosen identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operations termpool needs from a terminal host
///
/// Shell integration may become available some time after a session is
/// created; callers poll [`TerminalHost::has_shell_integration`] instead of
/// assuming it is fixed at creation.
#[async_trait]
pub trait TerminalHost: Send + Sync {
    /// Create a new terminal bound to `cwd`
    async fn create_session(&self, cwd: &Path) -> HostHandle;

    /// Whether structured execution is currently available
    fn has_shell_integration(&self, handle: &HostHandle) -> bool;

    /// Working directory as tracked by the host; `None` means unknown
    fn cwd(&self, handle: &HostHandle) -> Option<PathBuf>;

    /// Run `command` with start/end detection and return its output stream
    ///
    /// The stream ends when the host reports the command finished.
    async fn execute_structured(&self, handle: &HostHandle, command: &str) -> Result<OutputStream>;

    /// Inject `command` as plain text, with no output guarantees
    async fn send_text(&self, handle: &HostHandle, command: &str) -> Result<()>;

    /// Raw terminal write tap, used for best-effort capture when shell
    /// integration is missing
    fn raw_output(&self, _handle: &HostHandle) -> Option<OutputStream> {
        None
    }
}
