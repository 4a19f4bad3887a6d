//! Default configuration values

/// Maximum number of download retry attempts
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;

/// Base delay for download retry backoff (in milliseconds)
pub const DOWNLOAD_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Upper bound for a single backoff delay (in milliseconds)
pub const DOWNLOAD_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Default target platform
pub const DEFAULT_PLATFORM: &str = "pc";

/// Name of the default destination directory under the system temp dir
pub const DEFAULT_DEST_DIRNAME: &str = "avbbs";

/// Minimum proptest iterations
pub const MIN_PROPTEST_ITERATIONS: u32 = 100;
