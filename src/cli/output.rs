//! Output formatting and progress indicators
//!
//! Log initialisation, error rendering and download progress bars. Build
//! command output itself is forwarded by the executor; everything printed
//! here goes to stderr so stdout stays usable for `order --json`.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::core::stage::ProgressFactory;
use crate::error::{AvbbsError, PackageError, ResolverError, SchemaError};
use crate::infra::download::ProgressCallback;

/// Log level for the given `-v` count and `-q` flag
pub fn log_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Install the global tracing subscriber. `RUST_LOG` directives still apply.
pub fn init_tracing(verbose: u8, quiet: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(log_level(verbose, quiet).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Print an error and its causes to stderr, listing every schema violation
pub fn display_error(err: &anyhow::Error) {
    eprintln!("{} Error: {err}", status::ERROR);

    let mut last = err.to_string();
    for cause in err.chain().skip(1) {
        let message = cause.to_string();
        if !last.contains(&message) {
            eprintln!("  caused by: {message}");
        }
        last = message;
    }

    if let Some(schema) = find_schema_error(err) {
        for violation in &schema.errors {
            eprintln!("  - {violation}");
        }
    }
}

fn find_schema_error(err: &anyhow::Error) -> Option<&SchemaError> {
    err.chain().find_map(|cause| {
        if let Some(err) = cause.downcast_ref::<AvbbsError>() {
            return err.schema_violations();
        }
        if let Some(ResolverError::Package(PackageError::Schema(err))) =
            cause.downcast_ref::<ResolverError>()
        {
            return Some(err);
        }
        if let Some(PackageError::Schema(err)) = cause.downcast_ref::<PackageError>() {
            return Some(err);
        }
        cause.downcast_ref::<SchemaError>()
    })
}

/// Create a progress bar for downloads
pub fn create_download_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .expect("Invalid progress bar template")
            .progress_chars("█▓▒░"),
    );
    pb
}

/// Progress factory drawing one bar per archive download
pub fn download_progress() -> ProgressFactory {
    Arc::new(|url: &str| {
        let pb = create_download_bar(0);
        pb.set_message(url.rsplit('/').next().unwrap_or(url).to_string());
        Box::new(move |downloaded: u64, total: u64| {
            if total > 0 && pb.length() != Some(total) {
                pb.set_length(total);
            }
            pb.set_position(downloaded);
            if total > 0 && downloaded >= total {
                pb.finish_and_clear();
            }
        }) as ProgressCallback
    })
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Skipped prefix
    pub const SKIPPED: &str = "↷";
}
