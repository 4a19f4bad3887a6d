//! avbbs - A very basic build system
//!
//! Entry point for the avbbs command-line application.

use anyhow::Result;
use clap::Parser;

use avbbs::cli::output::{display_error, init_tracing};
use avbbs::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
