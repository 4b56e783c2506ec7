//! Command Execution
//!
//! One [`CommandProcess`] per command invocation. It owns the output capture
//! and hot timer, and reports to the caller through a [`CommandHandle`].

pub mod capture;
pub mod events;
pub mod handle;
pub mod process;

// Re-exports for convenience
pub use capture::{CapturedChunk, OutputCapture};
pub use events::{ProcessCompletion, ProcessEvent, ProcessEvents};
pub use handle::CommandHandle;
pub use process::{CommandProcess, ProcessPhase, SessionHooks, LIMITED_CAPTURE_NOTICE};
