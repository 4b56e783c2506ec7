//! Caller-side handle for a running command

use super::events::{ProcessCompletion, ProcessEvent, ProcessEvents};
use super::process::CommandProcess;
use crate::error::Result;

/// What `run_command` hands back: the event stream, the completion future
/// and access to the process itself
#[derive(Debug)]
pub struct CommandHandle {
    process: CommandProcess,
    events: ProcessEvents,
    completion: ProcessCompletion,
}

impl CommandHandle {
    pub(crate) fn new(
        process: CommandProcess,
        events: ProcessEvents,
        completion: ProcessCompletion,
    ) -> Self {
        Self {
            process,
            events,
            completion,
        }
    }

    /// Wait for the next event; `None` after the final one
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Take an already delivered event without waiting
    pub fn try_next_event(&mut self) -> Option<ProcessEvent> {
        self.events.try_recv()
    }

    /// Wait for completion without listening to lines
    ///
    /// Lines that are not consumed stay available through the drain.
    pub async fn wait(self) -> Result<()> {
        let Self {
            events, completion, ..
        } = self;
        drop(events);
        completion.await
    }

    /// Split into the event stream and the completion future
    pub fn into_parts(self) -> (ProcessEvents, ProcessCompletion) {
        (self.events, self.completion)
    }

    pub fn process(&self) -> &CommandProcess {
        &self.process
    }

    /// See [`CommandProcess::stop_listening`]
    pub fn stop_listening(&self) {
        self.process.stop_listening();
    }

    pub fn is_hot(&self) -> bool {
        self.process.is_hot()
    }

    /// See [`CommandProcess::unretrieved_output`]
    pub fn unretrieved_output(&self) -> String {
        self.process.unretrieved_output()
    }
}
