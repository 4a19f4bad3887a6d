//! Source staging
//!
//! Fetches a package's declared source archive into its context directory
//! and unpacks it into the build directory. Staging is idempotent: a
//! non-empty build directory is taken as already staged, and an archive
//! already present in the context directory is reused instead of being
//! downloaded again.
//!
//! Archives are unpacked into a sibling `build.partial` directory and moved
//! over the build directory only once extraction succeeds, so a failed or
//! cancelled run never leaves a half-filled build directory behind. An
//! archive without a declared checksum that fails to unpack is dropped from
//! the cache so the next run downloads it again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::names::PARTIAL_BUILD_SUBDIR;

use crate::core::package::PackageDescriptor;
use crate::core::workspace::PackagePaths;
use crate::error::{ArchiveError, StagingError};
use crate::infra::archive::extract as extract_archive;
use crate::infra::download::{verify_checksum, DownloadManager, ProgressCallback};
use crate::infra::filesystem;

/// Builds a progress callback for the download of the given URL
pub type ProgressFactory = Arc<dyn Fn(&str) -> ProgressCallback + Send + Sync>;

/// What staging did for a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The descriptor declares no source
    NoSource,
    /// The build directory already had content
    AlreadyStaged { archive: PathBuf },
    /// The archive was unpacked into the build directory
    Extracted { archive: PathBuf, downloaded: bool },
}

impl StageOutcome {
    /// Local archive path, if the package has a source
    pub fn archive(&self) -> Option<&Path> {
        match self {
            Self::NoSource => None,
            Self::AlreadyStaged { archive } | Self::Extracted { archive, .. } => Some(archive),
        }
    }
}

/// Fetches and unpacks package sources
#[derive(Clone, Default)]
pub struct SourceStager {
    downloads: DownloadManager,
    progress: Option<ProgressFactory>,
}

impl std::fmt::Debug for SourceStager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceStager")
            .field("downloads", &self.downloads)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl SourceStager {
    pub fn new(downloads: DownloadManager) -> Self {
        Self {
            downloads,
            progress: None,
        }
    }

    /// Report download progress through callbacks made by `factory`
    #[must_use]
    pub fn with_progress(mut self, factory: ProgressFactory) -> Self {
        self.progress = Some(factory);
        self
    }

    /// Make sure the package's source is unpacked in its build directory
    pub async fn prepare(
        &self,
        descriptor: &PackageDescriptor,
        paths: &PackagePaths,
        cancel: &CancellationToken,
    ) -> Result<StageOutcome, StagingError> {
        let Some(source) = descriptor.resolved_source() else {
            return Ok(StageOutcome::NoSource);
        };
        let archive = archive_path(&source, paths)?;

        if !filesystem::is_empty_dir(&paths.build_dir)? {
            debug!(
                "Build directory {} is not empty, skipping staging",
                paths.build_dir.display()
            );
            return Ok(StageOutcome::AlreadyStaged { archive });
        }

        filesystem::create_dir_all(&paths.context_dir)?;
        let downloaded = self.fetch(descriptor, &source, &archive, cancel).await?;
        if cancel.is_cancelled() {
            return Err(StagingError::Cancelled);
        }

        if let Err(e) = unpack(&archive, paths, cancel).await {
            if !e.is_cancelled() && descriptor.sha256.is_none() {
                warn!("Removing unusable archive {}", archive.display());
                let _ = std::fs::remove_file(&archive);
            }
            return Err(e);
        }

        Ok(StageOutcome::Extracted {
            archive,
            downloaded,
        })
    }

    /// Ensure `archive` holds a valid copy of `source`; true if downloaded
    async fn fetch(
        &self,
        descriptor: &PackageDescriptor,
        source: &str,
        archive: &Path,
        cancel: &CancellationToken,
    ) -> Result<bool, StagingError> {
        let expected = descriptor.sha256.as_deref();

        if archive.is_file() {
            let valid = match expected {
                Some(hash) => verify_checksum(archive, hash)?,
                None => true,
            };
            if valid {
                debug!("Reusing cached archive {}", archive.display());
                return Ok(false);
            }
            warn!(
                "Cached archive {} does not match its checksum, downloading again",
                archive.display()
            );
        }

        info!("Downloading {source}");
        let progress = self.progress.as_ref().map(|factory| factory(source));
        let result = match expected {
            Some(hash) => {
                self.downloads
                    .download_verified(source, archive, hash, progress, cancel)
                    .await?
            }
            None => {
                self.downloads
                    .download(source, archive, progress, cancel)
                    .await?
            }
        };
        info!("Downloaded {} ({} bytes)", archive.display(), result.size);
        Ok(true)
    }
}

/// Extract `archive` next to the build directory, then move it into place.
/// The build directory only ever holds a completely unpacked tree.
async fn unpack(
    archive: &Path,
    paths: &PackagePaths,
    cancel: &CancellationToken,
) -> Result<(), StagingError> {
    let partial = paths.context_dir.join(PARTIAL_BUILD_SUBDIR);
    filesystem::remove_dir_all(&partial)?;

    info!("Extracting {}", archive.display());
    let (from, to) = (archive.to_path_buf(), partial.clone());
    let task = tokio::task::spawn_blocking(move || extract_archive(&from, &to));
    let extracted = tokio::select! {
        _ = cancel.cancelled() => return Err(StagingError::Cancelled),
        joined = task => joined.map_err(|e| ArchiveError::Extract {
            file: archive.display().to_string(),
            error: e.to_string(),
        })?,
    };

    if let Err(e) = extracted {
        filesystem::remove_dir_all(&partial)?;
        return Err(e.into());
    }
    filesystem::replace_dir(&partial, &paths.build_dir)?;
    Ok(())
}

/// Where the archive for `source` is kept: the URL's last path segment,
/// without query or fragment, inside the context directory
pub fn archive_path(source: &str, paths: &PackagePaths) -> Result<PathBuf, StagingError> {
    archive_file_name(source)
        .map(|name| paths.context_dir.join(name))
        .ok_or_else(|| StagingError::InvalidSource {
            source_url: source.to_string(),
        })
}

fn archive_file_name(source: &str) -> Option<&str> {
    let without_suffix = source.split(['?', '#']).next().unwrap_or(source);
    let name = without_suffix.rsplit('/').next()?;
    (!name.is_empty() && name != "." && name != "..").then_some(name)
}
