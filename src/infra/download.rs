//! HTTP download functionality
//!
//! Fetches source archives with progress reporting, checksum verification
//! and retry with exponential backoff. Bytes are streamed into a `.part`
//! file next to the destination and only renamed into place once the
//! transfer completed, so an interrupted fetch never looks like a cached
//! archive. A cancelled download stops at the next chunk or backoff wait
//! and removes its `.part` file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::defaults;
use crate::error::DownloadError;

/// Progress callback type for download progress reporting
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Download result containing file path and metadata
#[derive(Debug)]
pub struct DownloadResult {
    /// Path to the downloaded file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// SHA256 checksum of the downloaded content
    pub checksum: String,
}

/// Download manager for fetching files with retry
#[derive(Debug, Clone)]
pub struct DownloadManager {
    /// HTTP client
    client: reqwest::Client,
    /// Maximum attempts per download
    max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds)
    base_delay_ms: u64,
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(300))
        .connect_timeout(Duration::from_secs(30))
        .user_agent(concat!("avbbs/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

impl DownloadManager {
    /// Create a new download manager
    pub fn new() -> Self {
        Self::with_config(
            defaults::MAX_DOWNLOAD_RETRIES,
            defaults::DOWNLOAD_RETRY_BASE_DELAY_MS,
        )
    }

    /// Create a download manager with custom settings
    pub fn with_config(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            client: build_client(),
            max_retries: max_retries.max(1),
            base_delay_ms,
        }
    }

    /// Download a file with retry logic
    ///
    /// # Arguments
    /// * `url` - URL to download from
    /// * `dest` - Destination path
    /// * `progress` - Optional progress callback (`bytes_downloaded`, `total_bytes`)
    /// * `cancel` - Aborts the transfer and any pending retry when fired
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<DownloadResult, DownloadError> {
        let partial = partial_path(dest);
        let result = self.download_with_retry(url, dest, &partial, progress, cancel).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result
    }

    async fn download_with_retry(
        &self,
        url: &str,
        dest: &Path,
        partial: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<DownloadResult, DownloadError> {
        let mut last_error = None;
        let mut delay_ms = self.base_delay_ms;

        for attempt in 1..=self.max_retries {
            let outcome = tokio::select! {
                () = cancel.cancelled() => Err(cancelled(url)),
                outcome = self.download_once(url, partial, progress.as_ref()) => outcome,
            };
            match outcome {
                Err(e @ DownloadError::Cancelled { .. }) => return Err(e),
                Ok(mut result) => {
                    tokio::fs::rename(partial, dest)
                        .await
                        .map_err(|e| DownloadError::IoError {
                            path: dest.to_path_buf(),
                            error: e.to_string(),
                        })?;
                    result.path = dest.to_path_buf();
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Download attempt {attempt}/{} failed: {e}", self.max_retries);
                    last_error = Some(e);

                    if attempt < self.max_retries {
                        tokio::select! {
                            () = cancel.cancelled() => return Err(cancelled(url)),
                            () = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                        }
                        delay_ms = (delay_ms * 2).min(defaults::DOWNLOAD_RETRY_MAX_DELAY_MS);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DownloadError::MaxRetriesExceeded {
            url: url.to_string(),
            retries: self.max_retries,
        }))
    }

    async fn download_once(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<DownloadResult, DownloadError> {
        let network_error = |error: String| DownloadError::NetworkError {
            url: url.to_string(),
            error,
        };
        let io_error = |path: &Path, e: std::io::Error| DownloadError::IoError {
            path: path.to_path_buf(),
            error: e.to_string(),
        };

        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(network_error(format!("HTTP {}", response.status())));
        }

        let total_size = response.content_length().unwrap_or(0);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let mut file = File::create(dest).await.map_err(|e| io_error(dest, e))?;
        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| network_error(e.to_string()))?;
            file.write_all(&chunk).await.map_err(|e| io_error(dest, e))?;

            hasher.update(&chunk);
            downloaded += chunk.len() as u64;

            if let Some(cb) = progress {
                cb(downloaded, total_size);
            }
        }

        file.flush().await.map_err(|e| io_error(dest, e))?;

        Ok(DownloadResult {
            path: dest.to_path_buf(),
            size: downloaded,
            checksum: hex::encode(hasher.finalize()),
        })
    }

    /// Download a file and verify its checksum
    ///
    /// A mismatching file is deleted before the error is returned.
    pub async fn download_verified(
        &self,
        url: &str,
        dest: &Path,
        expected_checksum: &str,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<DownloadResult, DownloadError> {
        let result = self.download(url, dest, progress, cancel).await?;

        if !result.checksum.eq_ignore_ascii_case(expected_checksum) {
            let _ = tokio::fs::remove_file(dest).await;

            return Err(DownloadError::ChecksumFailed {
                file: dest.display().to_string(),
            });
        }

        Ok(result)
    }
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::new()
    }
}

fn cancelled(url: &str) -> DownloadError {
    DownloadError::Cancelled {
        url: url.to_string(),
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Compute the SHA256 checksum of a file without loading it whole
pub fn file_checksum(path: &Path) -> Result<String, DownloadError> {
    let io_error = |e: std::io::Error| DownloadError::IoError {
        path: path.to_path_buf(),
        error: e.to_string(),
    };
    let mut file = std::fs::File::open(path).map_err(io_error)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(io_error)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Verify SHA256 checksum of a file
pub fn verify_checksum(path: &Path, expected: &str) -> Result<bool, DownloadError> {
    Ok(file_checksum(path)?.eq_ignore_ascii_case(expected))
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    const ZERO_SHA256: &str = "0000000000000000000000000000000000000000000000000000000000000000";

    #[test]
    fn test_compute_checksum() {
        assert_eq!(compute_checksum(b"hello world"), HELLO_SHA256);
        assert_eq!(
            compute_checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_verify_checksum() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("test.txt");
        std::fs::write(&file_path, b"hello world").unwrap();

        assert!(verify_checksum(&file_path, HELLO_SHA256).unwrap());
        assert!(verify_checksum(&file_path, &HELLO_SHA256.to_uppercase()).unwrap());
        assert!(!verify_checksum(&file_path, ZERO_SHA256).unwrap());
    }

    #[test]
    fn test_verify_checksum_file_not_found() {
        let result = verify_checksum(Path::new("/nonexistent/file.tar.gz"), ZERO_SHA256);
        assert!(matches!(result, Err(DownloadError::IoError { .. })));
    }

    #[test]
    fn test_partial_path_is_sibling() {
        assert_eq!(
            partial_path(Path::new("/dest/zlib/zlib-1.3.tar.gz")),
            PathBuf::from("/dest/zlib/zlib-1.3.tar.gz.part")
        );
    }

    #[tokio::test]
    async fn test_download_success() {
        let mock_server = MockServer::start().await;
        let content = b"test archive content";

        Mock::given(method("GET"))
            .and(path("/src.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("nested").join("src.tar.gz");
        let manager = DownloadManager::new();

        let result = manager
            .download(
                &format!("{}/src.tar.gz", mock_server.uri()),
                &dest,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.checksum, compute_checksum(content));
        assert_eq!(result.size, content.len() as u64);
        assert_eq!(result.path, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), content);
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_download_reports_progress() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/progress.tar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"some bytes".to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
        let seen_clone = seen.clone();
        let progress: ProgressCallback = Box::new(move |downloaded, _total| {
            seen_clone.store(downloaded, std::sync::atomic::Ordering::SeqCst);
        });

        DownloadManager::new()
            .download(
                &format!("{}/progress.tar", mock_server.uri()),
                &temp.path().join("progress.tar"),
                Some(progress),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_download_verified_checksum_mismatch_deletes_file() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/wrong.tar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tampered".to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("wrong.tar");

        let result = DownloadManager::new()
            .download_verified(
                &format!("{}/wrong.tar", mock_server.uri()),
                &dest,
                ZERO_SHA256,
                None,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(DownloadError::ChecksumFailed { .. })));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_download_retry_on_failure() {
        let mock_server = MockServer::start().await;
        let content = b"retry content";

        Mock::given(method("GET"))
            .and(path("/retry.tar"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/retry.tar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let manager = DownloadManager::with_config(3, 10);

        let result = manager
            .download_verified(
                &format!("{}/retry.tar", mock_server.uri()),
                &temp.path().join("retry.tar"),
                &compute_checksum(content),
                None,
                &CancellationToken::new(),
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_download_gives_up_after_max_retries() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/fail.tar"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("fail.tar");

        let result = DownloadManager::with_config(2, 10)
            .download(
                &format!("{}/fail.tar", mock_server.uri()),
                &dest,
                None,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(DownloadError::NetworkError { .. })));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_slow_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow.tar"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("slow.tar");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = DownloadManager::new()
            .download(&format!("{}/slow.tar", mock_server.uri()), &dest, None, &cancel)
            .await;

        assert!(matches!(result, Err(DownloadError::Cancelled { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_cancel_skips_backoff_wait() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/flaky.tar"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = DownloadManager::with_config(3, 60_000)
            .download(
                &format!("{}/flaky.tar", mock_server.uri()),
                &temp.path().join("flaky.tar"),
                None,
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(DownloadError::Cancelled { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    fn data_strategy() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(any::<u8>(), 0..1000)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(defaults::MIN_PROPTEST_ITERATIONS))]

        #[test]
        fn prop_file_checksum_matches_in_memory(data in data_strategy()) {
            let temp = TempDir::new().unwrap();
            let file_path = temp.path().join("blob.bin");
            std::fs::write(&file_path, &data).unwrap();

            let checksum = compute_checksum(&data);
            prop_assert_eq!(file_checksum(&file_path).unwrap(), checksum.clone());
            prop_assert_eq!(checksum.len(), 64);
            prop_assert!(verify_checksum(&file_path, &checksum).unwrap());
        }
    }
}
