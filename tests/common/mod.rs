//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::TempDir;

/// Test project context
///
/// A temporary directory holding a `packages/` root, a `dest/` destination
/// and an empty config directory, so the user's global config never leaks
/// into a test.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        let project = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };
        project.create_dir("packages");
        project.create_dir("config");
        project
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Packages root passed to commands
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("packages")
    }

    /// Destination passed to commands
    pub fn dest(&self) -> PathBuf {
        self.dir.path().join("dest")
    }

    /// Shared log file that [`TestProject::record`] commands append to
    pub fn log(&self) -> PathBuf {
        self.dir.path().join("log.txt")
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create a directory in the test project
    pub fn create_dir(&self, name: &str) {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path).expect("Failed to create directory");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Write `packages/<name>/build.json`
    pub fn write_descriptor(&self, name: &str, descriptor: &Value) {
        self.create_file(&format!("packages/{name}/build.json"), &descriptor.to_string());
    }

    /// Write a descriptor with dependencies and phase commands
    pub fn write_package(&self, name: &str, depends: &[&str], commands: Value) {
        self.write_descriptor(
            name,
            &json!({
                "name": name,
                "version": "1.0",
                "build": { "depends": depends, "commands": commands }
            }),
        );
    }

    /// Command appending `entry` to the shared log
    pub fn record(&self, entry: &str) -> String {
        format!("sh -c 'echo {entry} >> {}'", self.log().display())
    }

    /// Lines of the shared log, empty if nothing ran
    pub fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.log())
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Remove the shared log
    pub fn reset_log(&self) {
        let _ = std::fs::remove_file(self.log());
    }

    /// Ledger of a package under the default test destination
    pub fn ledger(&self, name: &str) -> Vec<String> {
        let path = self.dest().join(name).join("state.json");
        std::fs::read_to_string(path)
            .map(|content| serde_json::from_str(&content).expect("Ledger is not JSON"))
            .unwrap_or_default()
    }

    /// Run avbbs with an isolated environment
    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("Failed to execute avbbs")
    }

    /// Run `avbbs build <root> --dest <dest>` with extra arguments
    pub fn build(&self, extra: &[&str]) -> Output {
        let root = self.root();
        let dest = self.dest();
        let mut args = vec!["build", path_str(&root), "--dest", path_str(&dest)];
        args.extend_from_slice(extra);
        self.run(&args)
    }

    /// avbbs command with an isolated environment, not yet run
    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_avbbs"));
        cmd.current_dir(self.dir.path())
            .args(args)
            .env("AVBBS_CONFIG_DIR", self.dir.path().join("config"))
            .env_remove("AVBBS_ARCH")
            .env_remove("AVBBS_PLATFORM")
            .env_remove("AVBBS_DEST")
            .env_remove("RUST_LOG");
        cmd
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Path as `&str`; test paths are always UTF-8
pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("Non UTF-8 test path")
}

/// Stdout of a finished command
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Stderr of a finished command
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
