//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use std::sync::OnceLock;

use anyhow::Result;
use clap::Parser;

use commands::Commands;

/// avbbs - A very basic build system
///
/// Builds a tree of source packages in dependency order, running each
/// package's phases as external commands and resuming where a previous
/// run stopped.
#[derive(Parser, Debug)]
#[command(name = "avbbs")]
#[command(author, version, long_version = long_version(), about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        self.command.run().await
    }
}

fn long_version() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| {
        let dirty = match option_env!("VERGEN_GIT_DIRTY") {
            Some("true") => "-dirty",
            _ => "",
        };
        format!(
            "{}\ncommit: {}{dirty}\nbuilt: {}\ntarget: {}",
            env!("CARGO_PKG_VERSION"),
            option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
            option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"),
            option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown"),
        )
    })
}
