//! Destination directory layout
//!
//! ```text
//! <dest>/
//! ├── install/                 shared install tree
//! └── <package>/               context dir: ledger, cached archive
//!     └── build/               extraction target
//!         └── <build.context>/ where commands run
//! ```

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::names::{
    BUILD_SUBDIR, INSTALL_SUBDIR, VAR_BUILD_DIR, VAR_CONTEXT_DIR, VAR_INSTALL_DIR,
};
use crate::core::expand::Bindings;
use crate::core::package::PackageDescriptor;
use crate::error::FilesystemError;
use crate::infra::filesystem;

/// Directories owned by one package's build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePaths {
    /// Holds the ledger and the downloaded archive
    pub context_dir: PathBuf,
    /// Source is extracted here
    pub build_dir: PathBuf,
    /// Working directory for phase commands
    pub work_dir: PathBuf,
    /// Shared install tree
    pub install_dir: PathBuf,
}

impl PackagePaths {
    /// Path variables exported to commands
    pub fn bindings(&self) -> Bindings {
        Bindings::from([
            (VAR_CONTEXT_DIR.to_string(), self.context_dir.display().to_string()),
            (VAR_BUILD_DIR.to_string(), self.work_dir.display().to_string()),
            (VAR_INSTALL_DIR.to_string(), self.install_dir.display().to_string()),
        ])
    }
}

/// The destination tree of a run
#[derive(Debug, Clone)]
pub struct Workspace {
    dest: PathBuf,
}

impl Workspace {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self { dest: dest.into() }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Shared install directory
    pub fn install_dir(&self) -> PathBuf {
        self.dest.join(INSTALL_SUBDIR)
    }

    /// Directories for `descriptor`
    pub fn package_paths(&self, descriptor: &PackageDescriptor) -> PackagePaths {
        let context_dir = self.dest.join(&descriptor.name);
        let build_dir = context_dir.join(BUILD_SUBDIR);
        let context = descriptor.resolved_context();
        let work_dir = if context.is_empty() {
            build_dir.clone()
        } else {
            build_dir.join(context)
        };

        PackagePaths {
            context_dir,
            build_dir,
            work_dir,
            install_dir: self.install_dir(),
        }
    }

    /// Delete the whole destination tree
    pub fn wipe(&self) -> Result<(), FilesystemError> {
        info!("Wiping destination {}", self.dest.display());
        filesystem::remove_dir_all(&self.dest)
    }

    /// Create the shared install directory
    pub fn ensure_install_dir(&self) -> Result<PathBuf, FilesystemError> {
        let install_dir = self.install_dir();
        filesystem::create_dir_all(&install_dir)?;
        Ok(install_dir)
    }
}
