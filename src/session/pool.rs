//! Terminal Session Pool
//!
//! Hands out idle sessions for a working directory, runs commands on them
//! and keeps their busy state in step with the command processes.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::registry::{paths_equal, SessionRegistry};
use crate::command::{CommandHandle, CommandProcess, SessionHooks};
use crate::config::{ExecutionConfig, NormalizerConfig};
use crate::error::{Error, Result};
use crate::models::{SessionId, SessionSummary, TerminalSession};
use crate::pty::shell_quote;

#[derive(Default)]
struct PoolState {
    /// Sessions handed out by this pool
    members: HashSet<SessionId>,
    /// Latest command process per session
    processes: HashMap<SessionId, CommandProcess>,
}

struct PoolInner {
    registry: Arc<SessionRegistry>,
    execution: ExecutionConfig,
    normalizer: NormalizerConfig,
    state: Mutex<PoolState>,
}

#[async_trait]
impl SessionHooks for PoolInner {
    async fn on_completed(&self, session_id: SessionId) {
        self.registry.update(session_id, |s| s.mark_idle()).await;
        debug!("Session {} is idle again", session_id);
    }

    async fn on_no_shell_integration(&self, session_id: SessionId) {
        self.registry.remove(session_id).await;

        let mut state = self.state.lock().await;
        state.members.remove(&session_id);
        state.processes.remove(&session_id);
        info!("Evicted session {} without shell integration", session_id);
    }

    async fn on_error(&self, session_id: SessionId, error: &Error) {
        let release = self.execution.release_on_error;
        self.registry
            .update(session_id, |s| {
                if release {
                    s.mark_idle();
                } else {
                    s.mark_faulted();
                }
            })
            .await;

        if release {
            warn!("Session {} released after error: {}", session_id, error);
        } else {
            warn!("Session {} marked faulted: {}", session_id, error);
        }
    }
}

/// Command that moves a shell into `cwd`
fn cd_command(cwd: &Path) -> String {
    if cfg!(windows) {
        format!("cd \"{}\"", cwd.display())
    } else {
        format!("cd {}", shell_quote(&cwd.to_string_lossy()))
    }
}

/// Pool of reusable terminal sessions
///
/// Cheap to clone; clones share membership and processes.
#[derive(Clone)]
pub struct TerminalPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for TerminalPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalPool")
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

impl TerminalPool {
    /// Create a pool over `registry` with the given execution settings
    pub fn new(
        registry: Arc<SessionRegistry>,
        execution: ExecutionConfig,
        normalizer: NormalizerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                registry,
                execution,
                normalizer,
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Create a pool from the full configuration
    pub fn from_config(registry: Arc<SessionRegistry>, config: &crate::config::Config) -> Self {
        Self::new(registry, config.execution.clone(), config.normalizer.clone())
    }

    /// The registry this pool draws sessions from
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.inner.registry
    }

    /// Get a session bound to `cwd`
    ///
    /// Prefers an idle session already in `cwd`, then any idle session moved
    /// there with `cd`, and finally provisions a new one. Never fails.
    pub async fn acquire_session(&self, cwd: &Path) -> TerminalSession {
        let registry = &self.inner.registry;
        let sessions = registry.all().await;

        let matching = sessions.iter().find(|s| {
            s.is_idle()
                && registry
                    .host_cwd(s)
                    .is_some_and(|actual| paths_equal(&actual, cwd))
        });
        if let Some(session) = matching {
            debug!("Reusing session {} in {}", session.id, cwd.display());
            return self.adopt(session.id, cwd).await.unwrap_or_else(|| session.clone());
        }

        if let Some(session) = sessions.iter().find(|s| s.is_idle()) {
            if let Some(reused) = self.move_session(session.id, cwd).await {
                return reused;
            }
        }

        let session = registry.create_session(cwd).await;
        self.inner.state.lock().await.members.insert(session.id);
        session
    }

    /// `cd` an idle session into `cwd`
    ///
    /// `None` when the session was lost, left unusable, or did not end up
    /// in `cwd`.
    async fn move_session(&self, id: SessionId, cwd: &Path) -> Option<TerminalSession> {
        let command = cd_command(cwd);
        debug!("Moving session {} with {}", id, command);

        match self.run_command(id, &command).await {
            Ok(handle) => {
                if let Err(e) = handle.wait().await {
                    warn!("'{}' failed on session {}: {}", command, id, e);
                    return None;
                }
            }
            Err(e) => {
                debug!("Could not move session {}: {}", id, e);
                return None;
            }
        }

        let registry = &self.inner.registry;
        let session = registry.get(id).await?;
        if !session.is_idle() {
            debug!("Session {} is no longer idle after '{}'", id, command);
            return None;
        }
        if let Some(actual) = registry.host_cwd(&session) {
            if !paths_equal(&actual, cwd) {
                warn!(
                    "Session {} stayed in {} after '{}'",
                    id,
                    actual.display(),
                    command
                );
                return None;
            }
        }

        self.adopt(id, cwd).await
    }

    /// Add a registry session to this pool's membership
    async fn adopt(&self, id: SessionId, cwd: &Path) -> Option<TerminalSession> {
        let session = self
            .inner
            .registry
            .update(id, |s| {
                s.working_directory = cwd.to_path_buf();
                s.clone()
            })
            .await?;

        self.inner.state.lock().await.members.insert(id);
        Some(session)
    }

    /// Run `command` on an idle session
    pub async fn run_command(&self, session_id: SessionId, command: &str) -> Result<CommandHandle> {
        let session = self
            .inner
            .registry
            .update(session_id, |s| {
                if !s.is_idle() {
                    return Err(Error::SessionBusy {
                        session_id,
                        last_command: s.last_command.clone().unwrap_or_default(),
                    });
                }
                s.mark_busy(command);
                Ok(s.clone())
            })
            .await
            .ok_or(Error::SessionNotFound { session_id })??;

        let (process, handle) = CommandProcess::new(
            session_id,
            command,
            self.inner.execution.clone(),
            self.inner.normalizer.clone(),
        );

        {
            let mut state = self.inner.state.lock().await;
            state.members.insert(session_id);
            state.processes.insert(session_id, process.clone());
        }

        let hooks: Arc<dyn SessionHooks> = self.inner.clone();
        process.start(
            Arc::clone(self.inner.registry.host()),
            session.host_handle,
            hooks,
        );
        debug!("Started '{}' on session {}", command, session_id);
        Ok(handle)
    }

    /// Pool members whose busy state equals `busy`; faulted sessions count
    /// as busy
    pub async fn list_sessions(&self, busy: bool) -> Vec<SessionSummary> {
        let members: Vec<SessionId> = {
            let state = self.inner.state.lock().await;
            state.members.iter().copied().collect()
        };

        let mut summaries = Vec::new();
        for id in members {
            if let Some(session) = self.inner.registry.get(id).await {
                if session.is_busy() == busy {
                    summaries.push(session.summary());
                }
            }
        }
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    /// Drain output of the session's latest command not yet seen
    pub async fn unretrieved_output(&self, session_id: SessionId) -> String {
        let state = self.inner.state.lock().await;
        if !state.members.contains(&session_id) {
            return String::new();
        }
        state
            .processes
            .get(&session_id)
            .map(|p| p.unretrieved_output())
            .unwrap_or_default()
    }

    /// Whether the session's latest command is still producing output
    pub async fn is_hot(&self, session_id: SessionId) -> bool {
        let state = self.inner.state.lock().await;
        state
            .processes
            .get(&session_id)
            .is_some_and(|p| p.is_hot())
    }

    /// Snapshot of a session known to the registry
    pub async fn session(&self, session_id: SessionId) -> Option<TerminalSession> {
        self.inner.registry.get(session_id).await
    }

    /// Forget every member and process; host sessions are left running
    pub async fn dispose_all(&self) {
        let mut state = self.inner.state.lock().await;
        state.members.clear();
        state.processes.clear();
        debug!("Pool disposed");
    }
}
