//! Build command implementation
//!
//! Implements `avbbs build`: resolves settings, runs the build executor and
//! prints a per-package summary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::cli::output::{download_progress, status};
use crate::core::builder::{BuildExecutor, BuildOptions, BuildReport};
use crate::core::global_config::{BuildConfig, BuildSettings, GlobalConfig};
use crate::core::stage::SourceStager;
use crate::infra::dirs::AvbbsDirs;
use crate::infra::download::DownloadManager;

/// Arguments of `avbbs build`
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Directory scanned recursively for package descriptors
    pub root: PathBuf,

    /// Target architecture (defaults to the host's)
    #[arg(long, env = "AVBBS_ARCH")]
    pub arch: Option<String>,

    /// Target platform
    #[arg(long, env = "AVBBS_PLATFORM")]
    pub platform: Option<String>,

    /// Root of the build and install trees
    #[arg(long, env = "AVBBS_DEST")]
    pub dest: Option<PathBuf>,

    /// Parallel jobs hint exported as AVBBS_JOBS
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Forget completed phases and rebuild every package
    #[arg(long)]
    pub clean: bool,

    /// Delete the whole destination tree before building
    #[arg(long)]
    pub clean_all: bool,

    /// Do not forward command output to the terminal
    #[arg(long)]
    pub quiet_output: bool,
}

impl BuildArgs {
    fn overrides(&self) -> BuildConfig {
        BuildConfig {
            arch: self.arch.clone(),
            platform: self.platform.clone(),
            dest: self.dest.clone(),
            jobs: self.jobs,
        }
    }
}

/// Execute the build command
pub async fn execute(args: BuildArgs) -> Result<()> {
    let config = GlobalConfig::load(&AvbbsDirs::new()).context("Failed to load global config")?;
    let settings = BuildSettings::resolve(&args.overrides(), &config);

    tracing::info!(
        "Building {} for {}/{} into {}",
        args.root.display(),
        settings.arch,
        settings.platform,
        settings.dest.display()
    );

    let options = BuildOptions {
        globals: settings.globals(),
        clean: args.clean,
        clean_all: args.clean_all,
        echo_output: !args.quiet_output,
        ..BuildOptions::new(&args.root, &settings.dest)
    };

    let mut stager = SourceStager::new(DownloadManager::new());
    if !args.quiet_output {
        stager = stager.with_progress(download_progress());
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping the running command");
            trigger.cancel();
        }
    });

    let result = BuildExecutor::new(options)
        .with_stager(stager)
        .with_cancellation(cancel)
        .run()
        .await;
    signal.abort();

    let report = result.context("Build failed")?;
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &BuildReport) {
    for package in &report.packages {
        let completed: Vec<String> = package.completed().map(|p| p.to_string()).collect();
        if completed.is_empty() {
            println!("{} {}: up to date", status::SKIPPED, package.name);
        } else {
            println!("{} {}: {}", status::SUCCESS, package.name, completed.join(", "));
        }
    }
    println!(
        "\n{} package(s) in {:.1}s, {} phase(s) run, {} skipped",
        report.packages.len(),
        report.duration.as_secs_f64(),
        report.completed_phases(),
        report.skipped_phases()
    );
}
