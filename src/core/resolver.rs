//! Dependency resolution
//!
//! Discovers package descriptors under a root directory and computes the
//! build order. The order is deterministic: among packages whose
//! dependencies are all placed, the lexicographically smallest name goes
//! first.
//!
//! Dependencies that name no discovered package are soft: they add no
//! ordering constraint. They usually refer to packages the host system
//! provides.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::names::DESCRIPTOR_FILE;
use crate::core::package::{self, PackageDescriptor};
use crate::error::ResolverError;

/// Dependency graph for packages
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Adjacency list: package -> dependencies
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package to the graph
    pub fn add_package<I, S>(&mut self, name: &str, dependencies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edges.insert(
            name.to_string(),
            dependencies.into_iter().map(Into::into).collect(),
        );
    }

    /// Whether `name` was added as a package
    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// Dependencies that name no package in the graph, with their dependents
    pub fn unresolved(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut missing: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (name, deps) in &self.edges {
            for dep in deps.iter().filter(|dep| !self.contains(dep)) {
                missing.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }
        missing
    }

    /// Compute topological sort (build order)
    ///
    /// Returns packages in order such that dependencies come before dependents.
    pub fn topological_sort(&self) -> Result<Vec<String>, ResolverError> {
        // Remaining in-graph dependencies per package
        let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (name, deps) in &self.edges {
            let known = deps.iter().filter(|dep| self.contains(dep));
            let mut count = 0;
            for dep in known {
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
                count += 1;
            }
            pending.insert(name.as_str(), count);
        }

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(self.edges.len());

        while let Some(next) = ready.pop_first() {
            order.push(next.to_string());
            pending.remove(next);
            for dependent in dependents.get(next).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if pending.is_empty() {
            Ok(order)
        } else {
            Err(ResolverError::CircularDependency {
                cycle: self.cycle_members(pending.into_keys().collect()),
            })
        }
    }

    /// Narrow the unplaced packages down to those on a cycle.
    ///
    /// Packages that merely depend on a cycle are dropped by repeatedly
    /// removing nodes nothing else in the set depends on.
    fn cycle_members(&self, mut remaining: BTreeSet<&str>) -> Vec<String> {
        loop {
            let depended_on: BTreeSet<&str> = remaining
                .iter()
                .flat_map(|name| self.edges.get(*name).into_iter().flatten())
                .map(String::as_str)
                .filter(|dep| remaining.contains(dep))
                .collect();
            let before = remaining.len();
            remaining.retain(|name| depended_on.contains(name));
            if remaining.len() == before {
                break;
            }
        }
        remaining.into_iter().map(str::to_string).collect()
    }

    /// Check if the graph has any cycles
    pub fn has_cycle(&self) -> bool {
        self.topological_sort().is_err()
    }
}

/// Outcome of resolving a packages root
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Package names in build order
    pub order: Vec<String>,
    /// Every loaded descriptor, by name
    pub packages: BTreeMap<String, PackageDescriptor>,
}

impl Resolution {
    /// Descriptors in build order
    pub fn ordered(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.order.iter().filter_map(|name| self.packages.get(name))
    }

    /// Look up a package by name
    pub fn get(&self, name: &str) -> Option<&PackageDescriptor> {
        self.packages.get(name)
    }
}

/// Find every directory under `root` holding a descriptor, sorted by path.
///
/// Hidden directories are not searched.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>, ResolverError> {
    if !root.is_dir() {
        return Err(ResolverError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    let mut dirs = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| ResolverError::Discovery {
            path: e.path().unwrap_or(root).to_path_buf(),
            error: e.to_string(),
        })?;
        if entry.file_type().is_file() && entry.file_name() == DESCRIPTOR_FILE {
            if let Some(parent) = entry.path().parent() {
                dirs.push(parent.to_path_buf());
            }
        }
    }

    dirs.sort();
    Ok(dirs)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Load every descriptor under `root` without ordering them
pub fn load_all(root: &Path) -> Result<BTreeMap<String, PackageDescriptor>, ResolverError> {
    let mut packages: BTreeMap<String, PackageDescriptor> = BTreeMap::new();

    for dir in discover(root)? {
        debug!("Loading package descriptor from {}", dir.display());
        let descriptor = package::load(&dir)?;
        if let Some(existing) = packages.get(&descriptor.name) {
            return Err(ResolverError::DuplicatePackage {
                name: descriptor.name.clone(),
                first: existing.directory.clone(),
                second: descriptor.directory.clone(),
            });
        }
        packages.insert(descriptor.name.clone(), descriptor);
    }

    Ok(packages)
}

/// Discover, load and order every package under `root`
pub fn resolve(root: &Path) -> Result<Resolution, ResolverError> {
    let packages = load_all(root)?;

    let mut graph = DependencyGraph::new();
    for descriptor in packages.values() {
        graph.add_package(&descriptor.name, descriptor.dependencies.iter().cloned());
    }

    for (dependency, dependents) in graph.unresolved() {
        warn!(
            "Dependency '{}' of {} is not provided by any package under {}; assuming it is already available",
            dependency,
            dependents.join(", "),
            root.display()
        );
    }

    let order = graph.topological_sort()?;
    info!("Resolved {} package(s): {}", order.len(), order.join(" -> "));

    Ok(Resolution { order, packages })
}
