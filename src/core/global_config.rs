//! Global configuration management
//!
//! Reads default build options from `config.toml` in the config directory
//! and layers them under command-line values:
//! CLI flag (or its environment variable) > config file > built-in default.
//!
//! ```toml
//! [build]
//! arch = "aarch64"
//! platform = "rpi4"
//! dest = "/var/tmp/avbbs"
//! jobs = 8
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::defaults::{DEFAULT_DEST_DIRNAME, DEFAULT_PLATFORM};
use crate::config::names::{VAR_ARCH, VAR_JOBS, VAR_PLATFORM};
use crate::core::expand::Bindings;
use crate::error::ConfigError;
use crate::infra::dirs::AvbbsDirs;

/// Global configuration for avbbs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default build options
    #[serde(default)]
    pub build: BuildConfig,
}

/// Build options; every field optional so layers can be stacked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Target architecture
    pub arch: Option<String>,

    /// Target platform
    pub platform: Option<String>,

    /// Destination directory for build and install trees
    pub dest: Option<PathBuf>,

    /// Parallel jobs hint exported to commands
    pub jobs: Option<usize>,
}

impl GlobalConfig {
    /// Load global configuration from the config directory
    ///
    /// A missing file yields the default configuration; an unreadable or
    /// invalid one is an error.
    pub fn load(dirs: &AvbbsDirs) -> Result<Self, ConfigError> {
        Self::load_from_path(&dirs.global_config_path())
    }

    /// Load global configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }
}

/// Fully resolved build settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    pub arch: String,
    pub platform: String,
    pub dest: PathBuf,
    pub jobs: usize,
}

impl BuildSettings {
    /// Layer command-line values over the config file over defaults
    pub fn resolve(cli: &BuildConfig, config: &GlobalConfig) -> Self {
        let file = &config.build;
        Self {
            arch: cli
                .arch
                .clone()
                .or_else(|| file.arch.clone())
                .unwrap_or_else(host_arch),
            platform: cli
                .platform
                .clone()
                .or_else(|| file.platform.clone())
                .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            dest: cli
                .dest
                .clone()
                .or_else(|| file.dest.clone())
                .unwrap_or_else(default_dest),
            jobs: cli.jobs.or(file.jobs).unwrap_or_else(num_cpus::get).max(1),
        }
    }

    /// Global variables exported to every command
    pub fn globals(&self) -> Bindings {
        Bindings::from([
            (VAR_ARCH.to_string(), self.arch.clone()),
            (VAR_PLATFORM.to_string(), self.platform.clone()),
            (VAR_JOBS.to_string(), self.jobs.to_string()),
        ])
    }
}

/// Architecture of the running host, in toolchain naming
pub fn host_arch() -> String {
    match std::env::consts::ARCH {
        "x86" => "i386".to_string(),
        other => other.to_string(),
    }
}

/// `<tmp>/avbbs`
pub fn default_dest() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_DEST_DIRNAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let config = GlobalConfig::load_from_path(&temp.path().join("config.toml")).unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn test_load_from_dirs() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("config.toml"),
            "[build]\narch = \"aarch64\"\njobs = 3\n",
        )
        .unwrap();

        let config = GlobalConfig::load(&AvbbsDirs::with_config_dir(temp.path().to_path_buf())).unwrap();

        assert_eq!(config.build.arch.as_deref(), Some("aarch64"));
        assert_eq!(config.build.jobs, Some(3));
        assert_eq!(config.build.platform, None);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[build\narch = ").unwrap();

        assert!(matches!(
            GlobalConfig::load_from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_cli_wins_over_config_file() {
        let config = GlobalConfig {
            build: BuildConfig {
                arch: Some("aarch64".to_string()),
                platform: Some("rpi4".to_string()),
                dest: Some(PathBuf::from("/from/config")),
                jobs: Some(2),
            },
        };
        let cli = BuildConfig {
            arch: Some("riscv64".to_string()),
            dest: Some(PathBuf::from("/from/cli")),
            ..BuildConfig::default()
        };

        let settings = BuildSettings::resolve(&cli, &config);

        assert_eq!(settings.arch, "riscv64");
        assert_eq!(settings.platform, "rpi4");
        assert_eq!(settings.dest, PathBuf::from("/from/cli"));
        assert_eq!(settings.jobs, 2);
    }

    #[test]
    fn test_defaults_apply_last() {
        let settings = BuildSettings::resolve(&BuildConfig::default(), &GlobalConfig::default());

        assert_eq!(settings.arch, host_arch());
        assert_eq!(settings.platform, "pc");
        assert_eq!(settings.dest, std::env::temp_dir().join("avbbs"));
        assert!(settings.jobs >= 1);
    }

    #[test]
    fn test_globals_are_exported() {
        let settings = BuildSettings {
            arch: "x86_64".to_string(),
            platform: "pc".to_string(),
            dest: PathBuf::from("/tmp/avbbs"),
            jobs: 4,
        };

        let globals = settings.globals();

        assert_eq!(globals.get("AVBBS_ARCH").map(String::as_str), Some("x86_64"));
        assert_eq!(globals.get("AVBBS_PLATFORM").map(String::as_str), Some("pc"));
        assert_eq!(globals.get("AVBBS_JOBS").map(String::as_str), Some("4"));
    }
}
