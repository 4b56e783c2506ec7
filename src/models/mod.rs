//! Core data models for termpool
//!
//! Session-level domain types shared by the registry, the pool and the
//! command processes.

pub mod terminal_session;

// Re-exports for convenience
pub use terminal_session::{SessionId, SessionStatus, SessionSummary, TerminalSession};
