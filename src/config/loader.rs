//! Configuration File Loading
//!
//! Looks for a TOML configuration file in a fixed set of locations and
//! falls back to defaults when none exists.

use super::Config;
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "TERMPOOL_CONFIG";

/// Configuration file loader
#[derive(Debug)]
pub struct ConfigLoader {
    /// Candidate configuration files, in priority order
    search_paths: Vec<PathBuf>,
    /// Configuration file that was loaded (if any)
    current_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Fall back to the default config when no file exists
    pub create_default: bool,
    /// Whether to validate configuration after loading
    pub validate: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            create_default: true,
            validate: true,
        }
    }
}

impl ConfigLoader {
    /// Create a loader over the default search paths
    pub fn new() -> Self {
        Self {
            search_paths: Self::get_search_paths(),
            current_path: None,
        }
    }

    /// Load configuration with default options
    pub fn load() -> Result<Config> {
        Self::new().load_with_options(LoadOptions::default())
    }

    /// Load configuration with custom options
    pub fn load_with_options(&mut self, options: LoadOptions) -> Result<Config> {
        let config = match self.find_config_file() {
            Some(path) => {
                let config = Self::load_from_path(&path)?;
                debug!("Loaded configuration from {}", path.display());
                self.current_path = Some(path);
                config
            }
            None if options.create_default => {
                debug!("No configuration file found, using defaults");
                Config::default()
            }
            None => {
                return Err(Error::ConfigLoadFailed {
                    path: self.search_paths.first().cloned().unwrap_or_default(),
                    reason: "no configuration file found".to_string(),
                })
            }
        };

        if options.validate {
            validate_config(&config)?;
        }

        Ok(config)
    }

    /// Load and validate a specific configuration file
    pub fn load_file(path: &Path) -> Result<Config> {
        let config = Self::load_from_path(path)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration as TOML
    pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| Error::ConfigParseFailed {
            format: "TOML".to_string(),
            reason: e.to_string(),
        })?;

        fs::write(path, content)?;
        Ok(())
    }

    fn load_from_path(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| Error::ConfigParseFailed {
            format: "TOML".to_string(),
            reason: e.to_string(),
        })
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.is_file()).cloned()
    }

    /// Get default search paths for configuration files
    fn get_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(explicit) = env::var_os(CONFIG_ENV_VAR) {
            let explicit = PathBuf::from(explicit);
            if !explicit.is_file() {
                warn!(
                    "{} points at {}, which does not exist",
                    CONFIG_ENV_VAR,
                    explicit.display()
                );
            }
            paths.push(explicit);
        }

        // Current working directory
        if let Ok(cwd) = env::current_dir() {
            paths.push(cwd.join("termpool.toml"));
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("termpool").join("config.toml"));
        }

        paths
    }

    /// Get the current configuration file path
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// List all search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Clear all search paths and add a single path
    pub fn set_search_path(&mut self, path: PathBuf) {
        self.search_paths = vec![path];
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let execution = &config.execution;

    let timeouts = [
        ("execution.hot_timeout_normal_ms", execution.hot_timeout_normal_ms),
        ("execution.hot_timeout_compiling_ms", execution.hot_timeout_compiling_ms),
        ("execution.shell_integration_timeout_ms", execution.shell_integration_timeout_ms),
        ("execution.shell_integration_poll_ms", execution.shell_integration_poll_ms),
        ("execution.fallback_capture_window_ms", execution.fallback_capture_window_ms),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            return Err(Error::ConfigValidationFailed {
                field: field.to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
    }

    if execution.hot_timeout_compiling_ms < execution.hot_timeout_normal_ms {
        return Err(Error::ConfigValidationFailed {
            field: "execution.hot_timeout_compiling_ms".to_string(),
            reason: "cannot be shorter than execution.hot_timeout_normal_ms".to_string(),
        });
    }

    if execution.compiling_markers.iter().all(|m| m.trim().is_empty()) {
        return Err(Error::ConfigValidationFailed {
            field: "execution.compiling_markers".to_string(),
            reason: "at least one marker is required".to_string(),
        });
    }

    if config.pty.rows == 0 || config.pty.cols == 0 {
        return Err(Error::ConfigValidationFailed {
            field: "pty".to_string(),
            reason: "rows and cols must be greater than 0".to_string(),
        });
    }

    if config.logging.level.trim().is_empty() {
        return Err(Error::ConfigValidationFailed {
            field: "logging.level".to_string(),
            reason: "log level cannot be empty".to_string(),
        });
    }

    Ok(())
}
