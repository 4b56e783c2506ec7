//! Session Management
//!
//! The registry knows every session on a host; a pool tracks the ones it
//! handed out and which of them are busy.

pub mod pool;
pub mod registry;

pub use pool::TerminalPool;
pub use registry::{paths_equal, SessionRegistry};
