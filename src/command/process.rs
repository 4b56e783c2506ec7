//! Command Process
//!
//! Runs exactly one command on one terminal session. The process drives the
//! host's output stream from its own task, turns it into line events and
//! tells the pool about the outcome through [`SessionHooks`].

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::capture::OutputCapture;
use super::events::{ProcessCompletion, ProcessEvent, ProcessEvents};
use super::handle::CommandHandle;
use crate::config::{ExecutionConfig, NormalizerConfig};
use crate::error::{Error, Result};
use crate::host::{HostHandle, TerminalHost};
use crate::models::SessionId;
use crate::terminal::{hot_period, HotTimer};

/// Notice lines emitted on Windows when output cannot be captured at all
pub const LIMITED_CAPTURE_NOTICE: [&str; 2] = [
    "Command executed. Limited terminal output capability on Windows without shell integration.",
    "To enable full output capture, consider using shell integration.",
];

/// Lifecycle callbacks from a command process to the owner of the session
///
/// Each hook is awaited before the matching event is emitted, so a caller
/// that sees `Completed` can rely on the session already being released.
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// The command finished normally
    async fn on_completed(&self, session_id: SessionId);

    /// The session has no shell integration and should be forgotten
    async fn on_no_shell_integration(&self, session_id: SessionId);

    /// The host failed while running the command
    async fn on_error(&self, session_id: SessionId, error: &Error);
}

/// Phase of a command process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessPhase {
    /// Created, not started
    Idle,
    /// Executing (or waiting for shell integration)
    Running,
    /// Fell back to plain text injection
    NoShellIntegration,
    /// Finished; no further output will be captured
    Completed,
}

struct ProcessState {
    phase: ProcessPhase,
    waiting_for_shell_integration: bool,
    capture: OutputCapture,
    events: Option<mpsc::UnboundedSender<ProcessEvent>>,
    completion: Option<oneshot::Sender<Result<()>>>,
}

impl ProcessState {
    fn emit(&mut self, event: ProcessEvent) {
        let Some(events) = &self.events else {
            return;
        };
        if events.send(event).is_err() {
            debug!("Event receiver dropped, no longer listening");
            self.events = None;
            self.capture.detach();
        }
    }

    /// Stop capturing lines for a listener that went away, so the output
    /// stays available through the drain
    fn check_listener(&mut self) {
        if self.events.as_ref().is_some_and(|events| events.is_closed()) {
            debug!("Event receiver dropped, no longer listening");
            self.events = None;
            self.capture.detach();
        }
    }

    fn emit_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            self.emit(ProcessEvent::Line(line));
        }
    }

    fn resolve(&mut self, result: Result<()>) {
        if let Some(completion) = self.completion.take() {
            let _ = completion.send(result);
        }
    }

    /// Final event; the stream ends after it
    fn close_with(&mut self, event: ProcessEvent) {
        self.emit(event);
        self.events = None;
    }
}

struct ProcessShared {
    session_id: SessionId,
    command: String,
    config: ExecutionConfig,
    timer: HotTimer,
    state: Mutex<ProcessState>,
}

/// One command invocation on one session
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct CommandProcess {
    shared: Arc<ProcessShared>,
}

impl std::fmt::Debug for CommandProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProcess")
            .field("session_id", &self.shared.session_id)
            .field("command", &self.shared.command)
            .field("phase", &self.phase())
            .finish()
    }
}

impl CommandProcess {
    /// Create an idle process and the handle its caller listens on
    pub fn new(
        session_id: SessionId,
        command: impl Into<String>,
        execution: ExecutionConfig,
        normalizer: NormalizerConfig,
    ) -> (Self, CommandHandle) {
        let command = command.into();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = oneshot::channel();

        let state = ProcessState {
            phase: ProcessPhase::Idle,
            waiting_for_shell_integration: false,
            capture: OutputCapture::new(command.clone(), normalizer),
            events: Some(event_tx),
            completion: Some(completion_tx),
        };

        let process = Self {
            shared: Arc::new(ProcessShared {
                session_id,
                command: command.clone(),
                config: execution,
                timer: HotTimer::new(),
                state: Mutex::new(state),
            }),
        };

        let handle = CommandHandle::new(
            process.clone(),
            ProcessEvents::new(event_rx),
            ProcessCompletion::new(command, completion_rx),
        );

        (process, handle)
    }

    /// Start running on `host_handle`; must be called inside a tokio runtime
    ///
    /// Calling it more than once has no effect.
    pub fn start(
        &self,
        host: Arc<dyn TerminalHost>,
        host_handle: HostHandle,
        hooks: Arc<dyn SessionHooks>,
    ) {
        {
            let mut state = self.state();
            if state.phase != ProcessPhase::Idle {
                warn!("Command '{}' already started", self.shared.command);
                return;
            }
            state.phase = ProcessPhase::Running;
        }

        let process = self.clone();
        tokio::spawn(async move {
            process.drive(host, host_handle, hooks).await;
        });
    }

    pub fn session_id(&self) -> SessionId {
        self.shared.session_id
    }

    pub fn command(&self) -> &str {
        &self.shared.command
    }

    pub fn phase(&self) -> ProcessPhase {
        self.state().phase
    }

    /// Whether output is still actively changing
    pub fn is_hot(&self) -> bool {
        self.shared.timer.is_hot()
    }

    pub fn is_waiting_for_shell_integration(&self) -> bool {
        self.state().waiting_for_shell_integration
    }

    pub fn is_listening(&self) -> bool {
        self.state().capture.is_listening()
    }

    /// One-shot drain of output the caller has not seen yet
    pub fn unretrieved_output(&self) -> String {
        self.state().capture.drain()
    }

    /// Everything normalized so far
    pub fn full_output(&self) -> String {
        self.state().capture.full_output().to_string()
    }

    /// Stop emitting lines and let the caller move on
    ///
    /// The partial line is flushed as a last `Line`, then `Continue` is
    /// emitted and the completion future resolves. Output that arrives
    /// later is only available through [`Self::unretrieved_output`].
    pub fn stop_listening(&self) {
        let mut state = self.state();
        if let Some(line) = state.capture.stop_listening() {
            state.emit(ProcessEvent::Line(line));
        }
        state.close_with(ProcessEvent::Continue);
        state.resolve(Ok(()));
        debug!("Stopped listening to '{}'", self.shared.command);
    }

    async fn drive(
        self,
        host: Arc<dyn TerminalHost>,
        host_handle: HostHandle,
        hooks: Arc<dyn SessionHooks>,
    ) {
        if !self.wait_for_shell_integration(host.as_ref(), &host_handle).await {
            self.run_without_shell_integration(host.as_ref(), &host_handle, hooks.as_ref())
                .await;
            return;
        }

        match self.run_structured(host.as_ref(), &host_handle).await {
            Ok(()) => self.complete(hooks.as_ref()).await,
            Err(e) => self.fail(hooks.as_ref(), e).await,
        }
    }

    async fn wait_for_shell_integration(&self, host: &dyn TerminalHost, handle: &HostHandle) -> bool {
        if host.has_shell_integration(handle) {
            return true;
        }

        self.state().waiting_for_shell_integration = true;
        debug!(
            "Waiting for shell integration on session {}",
            self.shared.session_id
        );

        let deadline = Instant::now() + self.shared.config.shell_integration_timeout();
        let available = loop {
            tokio::time::sleep(self.shared.config.shell_integration_poll()).await;
            if host.has_shell_integration(handle) {
                break true;
            }
            if Instant::now() >= deadline {
                break false;
            }
        };

        self.state().waiting_for_shell_integration = false;
        available
    }

    async fn run_structured(&self, host: &dyn TerminalHost, handle: &HostHandle) -> Result<()> {
        let command = &self.shared.command;
        debug!("Executing '{}' on session {}", command, self.shared.session_id);

        let mut stream = host
            .execute_structured(handle, command)
            .await
            .map_err(|e| match e {
                e @ Error::HostExecutionFailed { .. } => e,
                other => Error::HostExecutionFailed {
                    session_id: self.shared.session_id,
                    command: command.clone(),
                    reason: other.to_string(),
                },
            })?;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| match e {
                e @ Error::HostStreamFailed { .. } => e,
                other => Error::HostStreamFailed {
                    command: command.clone(),
                    reason: other.to_string(),
                },
            })?;

            if chunk.is_empty() {
                continue;
            }
            self.handle_chunk(&chunk);
        }

        Ok(())
    }

    fn handle_chunk(&self, chunk: &str) {
        let mut state = self.state();
        state.check_listener();
        let captured = state.capture.push_chunk(chunk);
        self.shared
            .timer
            .reset(hot_period(&captured.text, &self.shared.config));
        state.emit_lines(captured.lines);
    }

    /// Flush buffered output and leave the running phase
    fn finish_output(&self, phase: ProcessPhase) {
        let mut state = self.state();
        state.check_listener();
        let lines = state.capture.finish();
        state.emit_lines(lines);
        state.phase = phase;
        drop(state);
        self.shared.timer.cancel();
    }

    async fn complete(&self, hooks: &dyn SessionHooks) {
        self.finish_output(ProcessPhase::Completed);
        debug!("Command '{}' completed", self.shared.command);

        hooks.on_completed(self.shared.session_id).await;

        let mut state = self.state();
        state.emit(ProcessEvent::Completed);
        state.close_with(ProcessEvent::Continue);
        state.resolve(Ok(()));
    }

    async fn fail(&self, hooks: &dyn SessionHooks, error: Error) {
        self.finish_output(ProcessPhase::Completed);
        warn!("Command '{}' failed: {}", self.shared.command, error);

        hooks.on_error(self.shared.session_id, &error).await;

        let mut state = self.state();
        state.close_with(ProcessEvent::Error(error.to_string()));
        state.resolve(Err(error));
    }

    async fn run_without_shell_integration(
        &self,
        host: &dyn TerminalHost,
        handle: &HostHandle,
        hooks: &dyn SessionHooks,
    ) {
        self.state().phase = ProcessPhase::NoShellIntegration;
        warn!(
            "Session {} has no shell integration, sending '{}' as plain text",
            self.shared.session_id, self.shared.command
        );

        // Tap before sending so nothing written in between is missed
        let raw = host.raw_output(handle);
        let sent = match host.send_text(handle, &self.shared.command).await {
            Ok(()) => true,
            Err(e) => {
                let error = Error::SendTextFailed {
                    session_id: self.shared.session_id,
                    reason: e.to_string(),
                };
                warn!("'{}' not sent: {}", self.shared.command, error);
                false
            }
        };

        match raw {
            Some(raw) if sent => self.capture_raw_output(raw).await,
            _ if cfg!(windows) => {
                let mut state = self.state();
                state.emit(ProcessEvent::Line(String::new()));
                for notice in LIMITED_CAPTURE_NOTICE {
                    if let Some(line) = state.capture.push_notice(notice) {
                        state.emit(ProcessEvent::Line(line));
                    }
                }
            }
            _ => {}
        }

        self.finish_output(ProcessPhase::Completed);
        hooks.on_no_shell_integration(self.shared.session_id).await;

        let mut state = self.state();
        state.emit(ProcessEvent::NoShellIntegration);
        state.emit(ProcessEvent::Completed);
        state.close_with(ProcessEvent::Continue);
        state.resolve(Ok(()));
    }

    /// Best-effort capture of raw terminal writes for a fixed window
    async fn capture_raw_output(&self, mut raw: crate::host::OutputStream) {
        let window = tokio::time::sleep(self.shared.config.fallback_capture_window());
        tokio::pin!(window);

        loop {
            tokio::select! {
                _ = &mut window => break,
                chunk = raw.next() => match chunk {
                    Some(Ok(chunk)) if !chunk.is_empty() => self.handle_chunk(&chunk),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Raw output capture failed: {}", e);
                        break;
                    }
                    None => break,
                },
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, ProcessState> {
        // Never held across an await; a poisoned lock only means a panic elsewhere
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
