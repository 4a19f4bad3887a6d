//! State command implementation
//!
//! Implements `avbbs state`: lists the ledgered phases of every package and
//! can forget them for a single package, forcing it to rebuild.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::cli::output::status;
use crate::core::global_config::{BuildConfig, BuildSettings, GlobalConfig};
use crate::core::ledger::Ledger;
use crate::core::phase::Phase;
use crate::core::resolver;
use crate::core::workspace::Workspace;
use crate::infra::dirs::AvbbsDirs;

/// Execute the state command
pub fn execute(root: &Path, dest: Option<PathBuf>, clear: Option<&str>) -> Result<()> {
    let config = GlobalConfig::load(&AvbbsDirs::new()).context("Failed to load global config")?;
    let overrides = BuildConfig {
        dest,
        ..BuildConfig::default()
    };
    let workspace = Workspace::new(BuildSettings::resolve(&overrides, &config).dest);
    let packages = resolver::load_all(root)
        .with_context(|| format!("Failed to load packages under {}", root.display()))?;

    if let Some(name) = clear {
        let Some(descriptor) = packages.get(name) else {
            bail!("Package '{name}' not found under {}", root.display());
        };
        let ledger = Ledger::new(&workspace.package_paths(descriptor).context_dir);
        ledger.clear()?;
        println!("{} Cleared state of {name}", status::SUCCESS);
        return Ok(());
    }

    for descriptor in packages.values() {
        let ledger = Ledger::new(&workspace.package_paths(descriptor).context_dir);
        let phases = ledger.read()?;
        println!("{}", describe(&descriptor.name, &phases));
    }
    Ok(())
}

fn describe(name: &str, phases: &[Phase]) -> String {
    if phases.is_empty() {
        format!("{name}: (nothing built)")
    } else {
        let names: Vec<&str> = phases.iter().map(|p| p.as_str()).collect();
        format!("{name}: {}", names.join(", "))
    }
}
