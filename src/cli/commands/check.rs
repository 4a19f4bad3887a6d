//! Check command implementation
//!
//! Implements `avbbs check`: loads every descriptor under the root and
//! reports all problems at once instead of stopping at the first one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::cli::output::status;
use crate::core::package::{self, PackageDescriptor};
use crate::core::resolver::{self, DependencyGraph};
use crate::error::{PackageError, ResolverError};

/// Problems found under a packages root
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Descriptors that loaded cleanly, by name
    pub packages: BTreeMap<String, PackageDescriptor>,
    /// Descriptors that failed to load, by directory
    pub failures: Vec<(PathBuf, PackageError)>,
    /// Names declared by more than one descriptor
    pub duplicates: Vec<ResolverError>,
    /// Dependencies no package provides, with their dependents
    pub unresolved: BTreeMap<String, Vec<String>>,
    /// Ordering error, if the graph has a cycle
    pub cycle: Option<ResolverError>,
}

impl CheckReport {
    /// Number of hard errors
    pub fn error_count(&self) -> usize {
        self.failures.len() + self.duplicates.len() + usize::from(self.cycle.is_some())
    }
}

/// Inspect every descriptor under `root`
pub fn check(root: &Path) -> Result<CheckReport, ResolverError> {
    let mut report = CheckReport::default();

    for dir in resolver::discover(root)? {
        match package::load(&dir) {
            Ok(descriptor) => {
                if let Some(existing) = report.packages.get(&descriptor.name) {
                    report.duplicates.push(ResolverError::DuplicatePackage {
                        name: descriptor.name.clone(),
                        first: existing.directory.clone(),
                        second: descriptor.directory.clone(),
                    });
                } else {
                    report.packages.insert(descriptor.name.clone(), descriptor);
                }
            }
            Err(err) => report.failures.push((dir, err)),
        }
    }

    let mut graph = DependencyGraph::new();
    for descriptor in report.packages.values() {
        graph.add_package(&descriptor.name, descriptor.dependencies.iter().cloned());
    }
    report.unresolved = graph
        .unresolved()
        .into_iter()
        .map(|(dep, dependents)| {
            (
                dep.to_string(),
                dependents.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();
    report.cycle = graph.topological_sort().err();

    Ok(report)
}

/// Execute the check command
pub fn execute(root: &Path) -> Result<()> {
    tracing::info!("Checking packages under {}", root.display());
    let report = check(root)?;

    println!("Checking packages under {}...\n", root.display());

    for descriptor in report.packages.values() {
        println!(
            "{} {} {} ({})",
            status::SUCCESS,
            descriptor.name,
            descriptor.version,
            descriptor.directory.display()
        );
    }

    for (dir, err) in &report.failures {
        println!("{} {}", status::ERROR, dir.display());
        match err {
            PackageError::Schema(schema) => {
                for violation in &schema.errors {
                    println!("    - {violation}");
                }
            }
            other => println!("    - {other}"),
        }
    }

    for err in &report.duplicates {
        println!("{} {err}", status::ERROR);
    }

    if let Some(err) = &report.cycle {
        println!("{} {err}", status::ERROR);
    }

    if !report.unresolved.is_empty() {
        println!("\nWarnings:");
        for (dep, dependents) in &report.unresolved {
            println!(
                "  {} '{dep}' (needed by {}) is not provided by any package",
                status::WARNING,
                dependents.join(", ")
            );
        }
    }

    let errors = report.error_count();
    if errors > 0 {
        bail!("Check failed with {errors} error(s)");
    }

    println!("\n{} package(s) valid", report.packages.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::names::DESCRIPTOR_FILE;
    use tempfile::TempDir;

    fn write(root: &Path, dir: &str, content: &str) {
        let dir = root.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(DESCRIPTOR_FILE), content).unwrap();
    }

    #[test]
    fn test_reports_every_invalid_descriptor() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "good", r#"{"name": "good", "version": "1"}"#);
        write(temp.path(), "no-version", r#"{"name": "bad"}"#);
        write(temp.path(), "broken", "{ not json");

        let report = check(temp.path()).unwrap();

        assert_eq!(report.packages.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert!(report
            .failures
            .iter()
            .any(|(_, err)| matches!(err, PackageError::InvalidJson { .. })));
        assert!(report
            .failures
            .iter()
            .any(|(_, err)| matches!(err, PackageError::Schema(_))));
    }

    #[test]
    fn test_reports_cycles_and_missing_dependencies() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "a",
            r#"{"name": "a", "version": "1", "build": {"depends": ["b"]}}"#,
        );
        write(
            temp.path(),
            "b",
            r#"{"name": "b", "version": "1", "build": {"depends": ["a", "libc"]}}"#,
        );

        let report = check(temp.path()).unwrap();

        assert!(matches!(
            report.cycle,
            Some(ResolverError::CircularDependency { .. })
        ));
        assert_eq!(report.unresolved.get("libc"), Some(&vec!["b".to_string()]));
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn test_duplicate_names_are_errors() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "one", r#"{"name": "zlib", "version": "1"}"#);
        write(temp.path(), "two", r#"{"name": "zlib", "version": "2"}"#);

        let report = check(temp.path()).unwrap();

        assert_eq!(report.duplicates.len(), 1);
        assert!(execute(temp.path()).is_err());
    }
}
