//! Command Process Events
//!
//! A running command reports through two independent primitives: a stream
//! of [`ProcessEvent`]s for incremental output and a [`ProcessCompletion`]
//! future that resolves once the caller may move on.

use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

/// Events emitted by a command process, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ProcessEvent {
    /// One complete line of normalized output
    Line(String),
    /// The command finished
    Completed,
    /// The caller may proceed
    Continue,
    /// The host failed while the command was running
    Error(String),
    /// The session lacks shell integration and has been evicted
    NoShellIntegration,
}

impl ProcessEvent {
    /// The line text, for `Line` events
    pub fn as_line(&self) -> Option<&str> {
        match self {
            ProcessEvent::Line(line) => Some(line),
            _ => None,
        }
    }
}

/// Receiving half of a process's event channel
///
/// Ends after the final `Continue` (or `Error`). Dropping it counts as the
/// caller no longer listening.
#[derive(Debug)]
pub struct ProcessEvents {
    receiver: mpsc::UnboundedReceiver<ProcessEvent>,
}

impl ProcessEvents {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<ProcessEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event; `None` once the process has nothing more to say
    pub async fn recv(&mut self) -> Option<ProcessEvent> {
        self.receiver.recv().await
    }

    /// Take an event without waiting
    pub fn try_recv(&mut self) -> Option<ProcessEvent> {
        self.receiver.try_recv().ok()
    }
}

impl futures::Stream for ProcessEvents {
    type Item = ProcessEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Future resolving when the process completes or the caller stops listening
#[derive(Debug)]
pub struct ProcessCompletion {
    command: String,
    receiver: oneshot::Receiver<Result<()>>,
}

impl ProcessCompletion {
    pub(crate) fn new(command: impl Into<String>, receiver: oneshot::Receiver<Result<()>>) -> Self {
        Self {
            command: command.into(),
            receiver,
        }
    }
}

impl Future for ProcessCompletion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The process task went away without resolving
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::ProcessAborted {
                command: self.command.clone(),
            })),
        }
    }
}
