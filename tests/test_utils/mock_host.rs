//! Mock Terminal Host for Testing

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use termpool::error::{Error, Result};
use termpool::host::{HostHandle, OutputStream, TerminalHost};

/// One step of a scripted output stream
#[derive(Debug, Clone)]
pub enum MockChunk {
    /// Yield this text
    Text(String),
    /// Sleep before the next step
    Delay(Duration),
    /// Block until the gate is notified
    Gate(Arc<Notify>),
    /// Yield a stream error; nothing follows
    Fail(String),
}

impl MockChunk {
    pub fn text(text: &str) -> Self {
        MockChunk::Text(text.to_string())
    }
}

#[derive(Default)]
struct MockState {
    scripts: HashMap<String, Vec<MockChunk>>,
    cwds: HashMap<HostHandle, PathBuf>,
    executed: Vec<String>,
    sent: Vec<String>,
    raw_output: Option<Vec<String>>,
    execute_error: Option<String>,
    send_error: Option<String>,
    cd_ignored: bool,
}

/// Scripted terminal host
///
/// Commands without a script produce only their echo. A quoted `cd <dir>`
/// command moves the session's tracked directory.
pub struct MockHost {
    state: Mutex<MockState>,
    shell_integration: AtomicBool,
    next_handle: AtomicU64,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            shell_integration: AtomicBool::new(true),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Output for `command`: its echo followed by `chunks`
    pub fn script(&self, command: &str, chunks: Vec<MockChunk>) {
        self.lock().scripts.insert(command.to_string(), chunks);
    }

    /// Shorthand for a script made only of text chunks
    pub fn respond(&self, command: &str, chunks: &[&str]) {
        self.script(command, chunks.iter().map(|c| MockChunk::text(c)).collect());
    }

    pub fn set_shell_integration(&self, available: bool) {
        self.shell_integration.store(available, Ordering::SeqCst);
    }

    /// Chunks the raw output tap yields on the fallback path
    pub fn set_raw_output(&self, chunks: &[&str]) {
        self.lock().raw_output = Some(chunks.iter().map(|c| c.to_string()).collect());
    }

    /// Make every structured execution fail to start
    pub fn fail_execution(&self, reason: &str) {
        self.lock().execute_error = Some(reason.to_string());
    }

    /// Make plain text injection fail
    pub fn fail_send_text(&self, reason: &str) {
        self.lock().send_error = Some(reason.to_string());
    }

    /// Leave tracked directories unchanged on `cd`
    pub fn ignore_cd(&self) {
        self.lock().cd_ignored = true;
    }

    pub fn set_cwd(&self, handle: &HostHandle, cwd: &Path) {
        self.lock().cwds.insert(handle.clone(), cwd.to_path_buf());
    }

    /// Commands run through structured execution, in order
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Commands injected as plain text, in order
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Directory named by a `cd '<dir>'` or `cd "<dir>"` command
fn cd_target(command: &str) -> Option<PathBuf> {
    let rest = command.strip_prefix("cd ")?.trim();
    let dir = if let Some(quoted) = rest.strip_prefix('\'') {
        quoted.strip_suffix('\'')?.replace(r"'\''", "'")
    } else {
        rest.trim_matches('"').to_string()
    };
    (!dir.is_empty()).then(|| PathBuf::from(dir))
}

fn scripted_stream(steps: Vec<MockChunk>) -> OutputStream {
    stream::unfold(steps.into_iter(), |mut steps| async move {
        loop {
            match steps.next()? {
                MockChunk::Text(text) => return Some((Ok(text), steps)),
                MockChunk::Delay(period) => tokio::time::sleep(period).await,
                MockChunk::Gate(gate) => gate.notified().await,
                MockChunk::Fail(reason) => {
                    let error = Error::HostStreamFailed {
                        command: "mock".to_string(),
                        reason,
                    };
                    return Some((Err(error), Vec::new().into_iter()));
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl TerminalHost for MockHost {
    async fn create_session(&self, cwd: &Path) -> HostHandle {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let handle = HostHandle::new(format!("mock-{}", id));
        self.set_cwd(&handle, cwd);
        handle
    }

    fn has_shell_integration(&self, _handle: &HostHandle) -> bool {
        self.shell_integration.load(Ordering::SeqCst)
    }

    fn cwd(&self, handle: &HostHandle) -> Option<PathBuf> {
        self.lock().cwds.get(handle).cloned()
    }

    async fn execute_structured(&self, handle: &HostHandle, command: &str) -> Result<OutputStream> {
        let mut state = self.lock();
        if let Some(reason) = &state.execute_error {
            return Err(Error::Other(reason.clone()));
        }

        state.executed.push(command.to_string());
        if let Some(dir) = cd_target(command) {
            if !state.cd_ignored {
                state.cwds.insert(handle.clone(), dir);
            }
        }

        let mut steps = vec![MockChunk::Text(format!("{}\r\n", command))];
        steps.extend(state.scripts.get(command).cloned().unwrap_or_default());
        Ok(scripted_stream(steps))
    }

    async fn send_text(&self, _handle: &HostHandle, command: &str) -> Result<()> {
        let mut state = self.lock();
        if let Some(reason) = &state.send_error {
            return Err(Error::Other(reason.clone()));
        }
        state.sent.push(command.to_string());
        Ok(())
    }

    fn raw_output(&self, _handle: &HostHandle) -> Option<OutputStream> {
        let chunks = self.lock().raw_output.clone()?;
        Some(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }
}
