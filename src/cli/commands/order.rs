//! Order command implementation
//!
//! Implements `avbbs order`: prints the resolved build order, one package
//! per line or as a JSON array.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::resolver;

/// Execute the order command
pub fn execute(root: &Path, json: bool) -> Result<()> {
    let resolution = resolver::resolve(root)
        .with_context(|| format!("Failed to resolve packages under {}", root.display()))?;

    print!("{}", render(&resolution.order, json)?);
    Ok(())
}

fn render(order: &[String], json: bool) -> Result<String> {
    if json {
        let mut out = serde_json::to_string_pretty(order)?;
        out.push('\n');
        Ok(out)
    } else {
        Ok(order.iter().map(|name| format!("{name}\n")).collect())
    }
}
