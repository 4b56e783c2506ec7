//! PTY Terminal Host
//!
//! A [`TerminalHost`] that needs no editor: each session is a tracked
//! working directory, and every command runs in its own pseudoterminal.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;
use uuid::Uuid;

use super::process::spawn_command;
use super::streams::output_stream;
use crate::config::PtyConfig;
use crate::error::{Error, Result};
use crate::host::{HostHandle, OutputStream, TerminalHost};

/// Terminal host backed by portable-pty
#[derive(Debug)]
pub struct PtyHost {
    config: PtyConfig,
    /// Tracked working directory per session
    sessions: RwLock<HashMap<HostHandle, Arc<Mutex<PathBuf>>>>,
}

impl PtyHost {
    pub fn new(config: PtyConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of sessions created on this host
    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    fn tracked_cwd(&self, handle: &HostHandle) -> Option<Arc<Mutex<PathBuf>>> {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(handle).cloned())
    }

    fn spawn(&self, handle: &HostHandle, command: &str) -> Result<UnboundedReceiver<Vec<u8>>> {
        let tracked = self
            .tracked_cwd(handle)
            .ok_or_else(|| Error::PtyCreationFailed {
                command: command.to_string(),
                reason: format!("unknown terminal {}", handle),
            })?;

        let cwd = tracked.lock().unwrap_or_else(|e| e.into_inner()).clone();
        debug!("Spawning '{}' in {} for {}", command, cwd.display(), handle);
        spawn_command(command, &cwd, &self.config, tracked)
    }
}

impl Default for PtyHost {
    fn default() -> Self {
        Self::new(PtyConfig::default())
    }
}

#[async_trait]
impl TerminalHost for PtyHost {
    async fn create_session(&self, cwd: &Path) -> HostHandle {
        let handle = HostHandle::new(Uuid::new_v4().to_string());
        let tracked = Arc::new(Mutex::new(cwd.to_path_buf()));

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(handle.clone(), tracked);
        handle
    }

    fn has_shell_integration(&self, handle: &HostHandle) -> bool {
        self.tracked_cwd(handle).is_some()
    }

    fn cwd(&self, handle: &HostHandle) -> Option<PathBuf> {
        self.tracked_cwd(handle)
            .map(|cwd| cwd.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn execute_structured(&self, handle: &HostHandle, command: &str) -> Result<OutputStream> {
        let output_rx = self.spawn(handle, command)?;
        // A terminal echoes what was typed before the output follows
        Ok(output_stream(Some(format!("{}\r\n", command)), output_rx))
    }

    async fn send_text(&self, handle: &HostHandle, command: &str) -> Result<()> {
        let mut output_rx = self.spawn(handle, command)?;
        tokio::spawn(async move { while output_rx.recv().await.is_some() {} });
        Ok(())
    }
}
