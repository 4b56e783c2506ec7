//! Configuration management for termpool
//!
//! Timing heuristics, normalization options, the PTY host's shell and the
//! log level all live here. Every section falls back to its defaults when
//! absent from the configuration file.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use loader::{ConfigLoader, LoadOptions};

/// Main configuration structure for termpool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Command execution timing and pool policy
    pub execution: ExecutionConfig,

    /// Output normalization options
    pub normalizer: NormalizerConfig,

    /// PTY host configuration
    pub pty: PtyConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Command execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Hot period after an ordinary chunk, in milliseconds
    pub hot_timeout_normal_ms: u64,

    /// Hot period after a chunk that looks like a build in progress
    pub hot_timeout_compiling_ms: u64,

    /// How long to wait for shell integration before falling back
    pub shell_integration_timeout_ms: u64,

    /// Poll interval while waiting for shell integration
    pub shell_integration_poll_ms: u64,

    /// How long to capture raw output on the fallback path
    pub fallback_capture_window_ms: u64,

    /// Lowercase substrings that mark a chunk as "still compiling"
    pub compiling_markers: Vec<String>,

    /// Lowercase substrings that cancel a compiling marker
    pub marker_nullifiers: Vec<String>,

    /// Return a session to idle after a host stream error instead of
    /// marking it faulted
    pub release_on_error: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            hot_timeout_normal_ms: 2_000,
            hot_timeout_compiling_ms: 15_000,
            shell_integration_timeout_ms: 4_000,
            shell_integration_poll_ms: 50,
            fallback_capture_window_ms: 2_000,
            compiling_markers: to_strings(&[
                "compiling",
                "building",
                "bundling",
                "transpiling",
                "generating",
                "starting",
            ]),
            marker_nullifiers: to_strings(&[
                "compiled",
                "success",
                "finish",
                "complete",
                "succeed",
                "done",
                "end",
                "stop",
                "exit",
                "terminate",
                "error",
                "fail",
            ]),
            release_on_error: false,
        }
    }
}

impl ExecutionConfig {
    pub fn hot_timeout_normal(&self) -> Duration {
        Duration::from_millis(self.hot_timeout_normal_ms)
    }

    pub fn hot_timeout_compiling(&self) -> Duration {
        Duration::from_millis(self.hot_timeout_compiling_ms)
    }

    pub fn shell_integration_timeout(&self) -> Duration {
        Duration::from_millis(self.shell_integration_timeout_ms)
    }

    pub fn shell_integration_poll(&self) -> Duration {
        Duration::from_millis(self.shell_integration_poll_ms)
    }

    pub fn fallback_capture_window(&self) -> Duration {
        Duration::from_millis(self.fallback_capture_window_ms)
    }
}

/// Output normalization options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Remove literal commas from output
    pub strip_commas: bool,

    /// Convert CRLF line endings to LF
    pub normalize_crlf: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            strip_commas: true,
            normalize_crlf: true,
        }
    }
}

/// PTY host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtyConfig {
    /// POSIX shell used to run commands; `/bin/sh` when unset
    pub shell: Option<PathBuf>,

    /// Pseudoterminal rows
    pub rows: u16,

    /// Pseudoterminal columns
    pub cols: u16,

    /// Extra environment variables for spawned shells
    pub environment: std::collections::HashMap<String, String>,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            shell: None,
            rows: 24,
            cols: 200,
            environment: std::collections::HashMap::new(),
        }
    }
}

impl PtyConfig {
    /// The shell to spawn
    pub fn shell_path(&self) -> PathBuf {
        self.shell
            .clone()
            .unwrap_or_else(|| PathBuf::from("/bin/sh"))
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
