//! Session Registry
//!
//! Every session known to a terminal host, keyed by id. A registry can be
//! shared by several pools; each pool keeps its own membership set on top.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::host::TerminalHost;
use crate::models::{SessionId, TerminalSession};

/// Registry of terminal sessions on one host
pub struct SessionRegistry {
    host: Arc<dyn TerminalHost>,
    sessions: RwLock<HashMap<SessionId, TerminalSession>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    pub fn new(host: Arc<dyn TerminalHost>) -> Self {
        Self {
            host,
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The host the sessions live on
    pub fn host(&self) -> &Arc<dyn TerminalHost> {
        &self.host
    }

    /// Provision a new host session bound to `cwd`
    pub async fn create_session(&self, cwd: &Path) -> TerminalSession {
        let handle = self.host.create_session(cwd).await;
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let session = TerminalSession::new(id, cwd, handle);

        self.sessions.write().await.insert(id, session.clone());
        info!("Created session {} in {}", id, cwd.display());
        session
    }

    /// Snapshot of one session
    pub async fn get(&self, id: SessionId) -> Option<TerminalSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Snapshot of every session, ordered by id
    pub async fn all(&self) -> Vec<TerminalSession> {
        let mut sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by_key(|s| s.id);
        sessions
    }

    /// Apply `f` to a session in place
    pub async fn update<R>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut TerminalSession) -> R,
    ) -> Option<R> {
        self.sessions.write().await.get_mut(&id).map(f)
    }

    /// Forget a session; the host resource is left alone
    pub async fn remove(&self, id: SessionId) -> Option<TerminalSession> {
        let removed = self.sessions.write().await.remove(&id);
        if removed.is_some() {
            info!("Removed session {} from registry", id);
        }
        removed
    }

    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Working directory of a session as tracked by the host
    pub fn host_cwd(&self, session: &TerminalSession) -> Option<PathBuf> {
        self.host.cwd(&session.host_handle)
    }
}

/// Compare two paths after resolving `.`/`..` and trailing separators
///
/// Comparison is case-insensitive on Windows.
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    let a = normalize_path(a);
    let b = normalize_path(b);

    if cfg!(windows) {
        a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
    } else {
        a == b
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
