//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod check;
pub mod order;
pub mod state;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build every package under ROOT in dependency order
    Build(build::BuildArgs),

    /// Validate every package descriptor under ROOT without building
    Check {
        /// Directory scanned recursively for package descriptors
        root: PathBuf,
    },

    /// Print the resolved build order
    Order {
        /// Directory scanned recursively for package descriptors
        root: PathBuf,

        /// Print the order as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Show the completed phases of every package
    State {
        /// Directory scanned recursively for package descriptors
        root: PathBuf,

        /// Destination directory holding the package ledgers
        #[arg(long, env = "AVBBS_DEST")]
        dest: Option<PathBuf>,

        /// Forget the completed phases of one package
        #[arg(long, value_name = "PACKAGE")]
        clear: Option<String>,
    },
}

impl Commands {
    /// Run the command
    pub async fn run(self) -> Result<()> {
        match self {
            Self::Build(args) => build::execute(args).await,
            Self::Check { root } => check::execute(&root),
            Self::Order { root, json } => order::execute(&root, json),
            Self::State { root, dest, clear } => {
                state::execute(&root, dest, clear.as_deref())
            }
        }
    }
}
