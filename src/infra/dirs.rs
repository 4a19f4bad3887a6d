//! Platform-specific directory management
//!
//! Locates the configuration directory holding `config.toml`. Follows the
//! XDG Base Directory Specification on Linux and standard locations on
//! macOS. `AVBBS_CONFIG_DIR` overrides the platform default.

use std::env;
use std::path::PathBuf;

use crate::config::names::GLOBAL_CONFIG_FILE;

/// Environment variable overriding the config directory
pub const ENV_CONFIG_DIR: &str = "AVBBS_CONFIG_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "avbbs";

/// Platform-specific directory provider for avbbs
#[derive(Debug, Clone)]
pub struct AvbbsDirs {
    config_dir: PathBuf,
}

impl AvbbsDirs {
    /// Create a new `AvbbsDirs` instance
    ///
    /// Checks environment variables first, then falls back to platform defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: Self::resolve_config_dir(),
        }
    }

    /// Use an explicit config directory
    #[must_use]
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Get the config directory path
    ///
    /// - Linux: `$XDG_CONFIG_HOME/avbbs` or `~/.config/avbbs`
    /// - macOS: `~/Library/Application Support/avbbs`
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Path to `config.toml` in the config directory
    #[must_use]
    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir.join(GLOBAL_CONFIG_FILE)
    }

    fn resolve_config_dir() -> PathBuf {
        if let Ok(path) = env::var(ENV_CONFIG_DIR) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config").join(APP_NAME))
                    .unwrap_or_else(|| PathBuf::from(".").join(".config").join(APP_NAME))
            })
    }
}

impl Default for AvbbsDirs {
    fn default() -> Self {
        Self::new()
    }
}
