//! Pseudoterminal (PTY) Host
//!
//! Standalone terminal host: commands run in portable-pty pseudoterminals
//! and their output is decoded into host output streams.

pub mod host;
pub mod process;
pub mod streams;

// Re-exports for convenience
pub use host::PtyHost;
pub use process::{shell_quote, spawn_command, wrap_command};
pub use streams::{output_stream, Utf8Decoder};
