//! Per-package state ledger
//!
//! The ledger (`state.json` in a package's context directory) is a JSON
//! array of the phases completed since the last clean, in completion
//! order. All ledger I/O goes through [`Ledger`].
//!
//! Writes go to a sibling temporary file which is synced and renamed over
//! the ledger, so a reader sees either the old or the new list.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::names::LEDGER_FILE;
use crate::core::phase::Phase;
use crate::error::LedgerError;

/// Handle to one package's ledger file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Ledger stored in `context_dir`
    pub fn new(context_dir: &Path) -> Self {
        Self {
            path: context_dir.join(LEDGER_FILE),
        }
    }

    /// Location of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Completed phases, empty if no ledger exists yet
    pub fn read(&self) -> Result<Vec<Phase>, LedgerError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| LedgerError::Read {
            path: self.path.clone(),
            error: e.to_string(),
        })?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| LedgerError::Corrupt {
            path: self.path.clone(),
            error: e.to_string(),
        })
    }

    /// Record `phase` as completed and return the updated list.
    ///
    /// A phase already present is not recorded twice.
    pub fn append(&self, phase: Phase) -> Result<Vec<Phase>, LedgerError> {
        let mut phases = self.read()?;
        if !phases.contains(&phase) {
            phases.push(phase);
            self.write(&phases)?;
        }
        Ok(phases)
    }

    /// Forget every completed phase
    pub fn clear(&self) -> Result<Vec<Phase>, LedgerError> {
        self.write(&[])?;
        debug!("Cleared ledger {}", self.path.display());
        Ok(Vec::new())
    }

    fn write(&self, phases: &[Phase]) -> Result<(), LedgerError> {
        let write_error = |e: &dyn std::fmt::Display| LedgerError::Write {
            path: self.path.clone(),
            error: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_error(&e))?;
        }

        let content = serde_json::to_string(phases).map_err(|e| write_error(&e))?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = File::create(&temp_path).map_err(|e| write_error(&e))?;
        file.write_all(content.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| write_error(&e))?;
        drop(file);

        std::fs::rename(&temp_path, &self.path).map_err(|e| write_error(&e))
    }
}
