//! Error types for avbbs
//!
//! Domain-specific error types using thiserror.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::phase::Phase;

/// A single schema violation inside a package descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Path-like locator, e.g. `build.commands.configure[0].env.CC`
    pub path: String,
    /// Human readable message
    pub message: String,
}

impl SchemaViolation {
    /// Create a new violation
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A package descriptor failed validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Package '{}' validation failed ({} error(s))", package_label(.package_dir), .errors.len())]
pub struct SchemaError {
    /// Directory holding the offending descriptor
    pub package_dir: PathBuf,
    /// Every violation found
    pub errors: Vec<SchemaViolation>,
}

fn package_label(dir: &Path) -> String {
    dir.file_name().map_or_else(
        || dir.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Package loading errors
#[derive(Error, Debug)]
pub enum PackageError {
    /// Descriptor file could not be read
    #[error("Failed to read package descriptor '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Descriptor file is not valid JSON
    #[error("Package descriptor '{path}' is not valid JSON: {error}")]
    InvalidJson { path: PathBuf, error: String },

    /// Descriptor failed schema validation
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Dependency resolution errors
#[derive(Error, Debug)]
pub enum ResolverError {
    /// Packages root does not exist or is not a directory
    #[error("Packages root not found: {path}")]
    RootNotFound { path: PathBuf },

    /// Walking the packages root failed
    #[error("Failed to scan '{path}' for package descriptors: {error}")]
    Discovery { path: PathBuf, error: String },

    /// Two descriptors declare the same package name
    #[error("Package '{name}' is declared twice: {} and {}", .first.display(), .second.display())]
    DuplicatePackage {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Circular dependency detected
    #[error("Circular dependency detected between: {}", cycle.join(", "))]
    CircularDependency { cycle: Vec<String> },

    /// A descriptor failed to load
    #[error(transparent)]
    Package(#[from] PackageError),
}

/// Ledger (per-package state file) errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Failed to read the ledger file
    #[error("Failed to read ledger '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Ledger file holds something other than a list of phase names
    #[error("Ledger '{path}' is corrupt: {error}")]
    Corrupt { path: PathBuf, error: String },

    /// Failed to persist the ledger
    #[error("Failed to write ledger '{path}': {error}")]
    Write { path: PathBuf, error: String },
}

/// Command expansion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpandError {
    /// A quote was opened and never closed
    #[error("Unterminated quote in command: {command}")]
    UnterminatedQuote { command: String },

    /// The command expanded to nothing
    #[error("Command is empty after substitution: '{command}'")]
    EmptyCommand { command: String },
}

/// Spawned process errors
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Process could not be started
    #[error("Failed to launch '{program}': {error}")]
    Launch { program: String, error: String },

    /// Process exited unsuccessfully
    #[error("'{program}' exited with {}", exit_label(.code.as_ref()))]
    Exit { program: String, code: Option<i32> },

    /// Reading output or waiting on the process failed
    #[error("I/O error while running '{program}': {error}")]
    Io { program: String, error: String },

    /// Process was killed because the run was cancelled
    #[error("'{program}' was cancelled")]
    Cancelled { program: String },
}

fn exit_label(code: Option<&i32>) -> String {
    code.map_or_else(
        || "no exit code (terminated by signal)".to_string(),
        |code| format!("code {code}"),
    )
}

fn cancel_point(phase: Option<&Phase>) -> String {
    phase.map_or_else(
        || "source staging".to_string(),
        |phase| format!("phase '{phase}'"),
    )
}

/// Download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Network error
    #[error("Network error downloading '{url}': {error}")]
    NetworkError { url: String, error: String },

    /// Checksum verification failed
    #[error("Checksum verification failed for '{file}'")]
    ChecksumFailed { file: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Max retries exceeded
    #[error("Download failed after {retries} retries: {url}")]
    MaxRetriesExceeded { url: String, retries: u32 },

    /// The run was cancelled while downloading
    #[error("Download of '{url}' was cancelled")]
    Cancelled { url: String },
}

/// Archive extraction errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// File extension is not a supported archive format
    #[error("Unsupported archive format: {file}")]
    UnsupportedFormat { file: String },

    /// Extraction failed
    #[error("Failed to extract '{file}': {error}")]
    Extract { file: String, error: String },
}

/// Source staging errors
#[derive(Error, Debug)]
pub enum StagingError {
    /// Source URL has no usable file name
    #[error("Source '{source_url}' does not name an archive file")]
    InvalidSource { source_url: String },

    /// Fetching the archive failed
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Unpacking the archive failed
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Filesystem error while staging
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    /// The run was cancelled before the source was in place
    #[error("Staging was cancelled")]
    Cancelled,
}

impl StagingError {
    /// Whether staging stopped because the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Download(DownloadError::Cancelled { .. })
        )
    }
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to read directory
    #[error("Failed to read directory '{path}': {error}")]
    ReadDir { path: PathBuf, error: String },

    /// Failed to move a directory into place
    #[error("Failed to move '{}' to '{}': {error}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },
}

/// Build execution errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// A phase command failed to launch or exited non-zero
    #[error("Package '{package}' failed in phase '{phase}' running `{command}`: {error}")]
    CommandFailed {
        package: String,
        phase: Phase,
        command: String,
        error: ProcessError,
    },

    /// A phase command could not be expanded
    #[error("Package '{package}' has an invalid command in phase '{phase}': {error}")]
    Expand {
        package: String,
        phase: Phase,
        error: ExpandError,
    },

    /// Source staging failed
    #[error("Failed to stage source for package '{package}': {error}")]
    Staging { package: String, error: StagingError },

    /// The run was cancelled; `phase` is `None` while the source was staged
    #[error("Build cancelled during {} of package '{package}'", cancel_point(.phase.as_ref()))]
    Cancelled { package: String, phase: Option<Phase> },

    /// Ledger error
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Filesystem error
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// Global configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: PathBuf, error: String },
}

/// Top-level avbbs error type
#[derive(Error, Debug)]
pub enum AvbbsError {
    /// Resolver error
    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    /// Build error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AvbbsError {
    /// Schema violations carried by this error, if it wraps a `SchemaError`
    pub fn schema_violations(&self) -> Option<&SchemaError> {
        match self {
            Self::Resolver(ResolverError::Package(PackageError::Schema(err))) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_package_directory() {
        let err = SchemaError {
            package_dir: PathBuf::from("/packages/zlib"),
            errors: vec![SchemaViolation::new("name", "is required")],
        };
        assert_eq!(err.to_string(), "Package 'zlib' validation failed (1 error(s))");
    }

    #[test]
    fn test_violation_display_without_path() {
        let violation = SchemaViolation::new("", "expected an object");
        assert_eq!(violation.to_string(), "expected an object");
    }

    #[test]
    fn test_cycle_error_lists_packages() {
        let err = ResolverError::CircularDependency {
            cycle: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected between: a, b");
    }

    #[test]
    fn test_process_exit_label() {
        let err = ProcessError::Exit {
            program: "make".to_string(),
            code: Some(2),
        };
        assert_eq!(err.to_string(), "'make' exited with code 2");

        let err = ProcessError::Exit {
            program: "make".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn test_cancel_point_in_message() {
        let err = BuildError::Cancelled {
            package: "zlib".to_string(),
            phase: Some(Phase::Build),
        };
        assert_eq!(err.to_string(), "Build cancelled during phase 'build' of package 'zlib'");

        let err = BuildError::Cancelled {
            package: "zlib".to_string(),
            phase: None,
        };
        assert_eq!(err.to_string(), "Build cancelled during source staging of package 'zlib'");
    }

    #[test]
    fn test_staging_cancellation_is_recognised() {
        assert!(StagingError::Cancelled.is_cancelled());
        assert!(StagingError::Download(DownloadError::Cancelled { url: "u".to_string() }).is_cancelled());
        assert!(!StagingError::InvalidSource { source_url: "u".to_string() }.is_cancelled());
    }

    #[test]
    fn test_schema_violations_unwraps_nested_error() {
        let schema = SchemaError {
            package_dir: PathBuf::from("pkg"),
            errors: vec![SchemaViolation::new("version", "is required")],
        };
        let err = AvbbsError::from(ResolverError::from(PackageError::from(schema.clone())));
        assert_eq!(err.schema_violations(), Some(&schema));
    }
}
