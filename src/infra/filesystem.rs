//! Filesystem operations
//!
//! Handles directory operations for the working tree.

use std::path::Path;

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a directory and all its contents
pub fn remove_dir_all(path: &Path) -> Result<(), FilesystemError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| FilesystemError::RemoveDir {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Whether `path` is missing or a directory with no entries
pub fn is_empty_dir(path: &Path) -> Result<bool, FilesystemError> {
    if !path.exists() {
        return Ok(true);
    }
    let mut entries = std::fs::read_dir(path).map_err(|e| FilesystemError::ReadDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    Ok(entries.next().is_none())
}

/// Remove everything inside `path`, keeping the directory itself
pub fn empty_dir(path: &Path) -> Result<(), FilesystemError> {
    remove_dir_all(path)?;
    create_dir_all(path)
}

/// Move directory `from` to `to`, replacing whatever is at `to`
pub fn replace_dir(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    remove_dir_all(to)?;
    std::fs::rename(from, to).map_err(|e| FilesystemError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        error: e.to_string(),
    })
}
