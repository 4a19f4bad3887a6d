//! Source archive extraction
//!
//! Supports `.tar`, `.tar.gz`/`.tgz` and `.zip`. Extraction is blocking;
//! async callers should run it on a blocking thread.

use std::fs::File;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::ArchiveError;

/// Archive formats recognised by file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a file name
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Unpack `archive` into `dest`, creating `dest` if needed
pub fn extract(archive: &Path, dest: &Path) -> Result<ArchiveFormat, ArchiveError> {
    let file_label = archive.display().to_string();
    let format = archive
        .file_name()
        .and_then(|name| ArchiveFormat::from_file_name(&name.to_string_lossy()))
        .ok_or_else(|| ArchiveError::UnsupportedFormat {
            file: file_label.clone(),
        })?;
    let extract_error = |error: String| ArchiveError::Extract {
        file: file_label.clone(),
        error,
    };

    std::fs::create_dir_all(dest).map_err(|e| extract_error(e.to_string()))?;
    let file = File::open(archive).map_err(|e| extract_error(e.to_string()))?;

    match format {
        ArchiveFormat::Tar => tar::Archive::new(file)
            .unpack(dest)
            .map_err(|e| extract_error(e.to_string()))?,
        ArchiveFormat::TarGz => tar::Archive::new(GzDecoder::new(file))
            .unpack(dest)
            .map_err(|e| extract_error(e.to_string()))?,
        ArchiveFormat::Zip => zip::ZipArchive::new(file)
            .and_then(|mut zip| zip.extract(dest))
            .map_err(|e| extract_error(e.to_string()))?,
    }

    Ok(format)
}
