//! termpool - pooled terminal sessions with clean, line-oriented output
//!
//! termpool runs shell commands inside reusable terminal sessions and turns
//! the raw, escape-laden terminal output into line events a calling agent
//! can consume. It also tracks whether a command is still "hot" (its output
//! is still changing) so callers know when to wait before reacting.
//!
//! ## Module Organization
//!
//! - [`session`] - Session registry and the pool that hands sessions out
//! - [`command`] - Per-command process, events and completion future
//! - [`terminal`] - Output normalization, line emission, hot/cool tracking
//! - [`ansi`] - Escape sequence recognition and stripping
//! - [`host`] - The terminal host abstraction
//! - [`pty`] - A standalone terminal host built on `portable-pty`
//! - [`config`] - Configuration loading and validation
//! - [`models`] - Session data model
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use termpool::{pty_pool, Config, ProcessEvent};
//!
//! # async fn example() -> termpool::Result<()> {
//! let pool = pty_pool(&Config::default());
//! let session = pool.acquire_session(Path::new("/tmp")).await;
//!
//! let mut handle = pool.run_command(session.id, "echo hello").await?;
//! while let Some(event) = handle.next_event().await {
//!     if let ProcessEvent::Line(line) = event {
//!         println!("{}", line);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Process tasks:** one tokio task per running command consumes the
//!   host's output stream
//! - **PTY reader threads:** blocking reads from the pseudoterminal are
//!   forwarded to async code over channels
//! - **Pool state:** membership and process table behind a single async
//!   mutex; sessions live in a shared registry

pub mod ansi;
pub mod command;
pub mod config;
pub mod error;
pub mod host;
pub mod models;
pub mod pty;
pub mod session;
pub mod terminal;

use std::sync::Arc;

// Re-exports for core functionality
pub use command::{CommandHandle, CommandProcess, ProcessEvent, ProcessPhase, SessionHooks};
pub use config::{Config, ConfigLoader, LoggingConfig};
pub use error::{Error, Result};
pub use host::{HostHandle, OutputStream, TerminalHost};
pub use models::{SessionId, SessionStatus, SessionSummary, TerminalSession};
pub use pty::PtyHost;
pub use session::{SessionRegistry, TerminalPool};

/// The current version of termpool from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The crate name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Install a `tracing` subscriber writing to stderr
///
/// `RUST_LOG` takes precedence over the configured level. Calling this
/// again after a subscriber is installed does nothing.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

/// A pool over a fresh [`PtyHost`] configured from `config`
pub fn pty_pool(config: &Config) -> TerminalPool {
    let host: Arc<dyn TerminalHost> = Arc::new(PtyHost::new(config.pty.clone()));
    let registry = Arc::new(SessionRegistry::new(host));
    TerminalPool::from_config(registry, config)
}
