//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use crate::core::phase::Phase;

    /// Generate a valid package name (lowercase alphanumeric with hyphens)
    pub fn package_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,30}[a-z0-9]?".prop_filter("Name must not be empty", |s| !s.is_empty())
    }

    /// Generate a dotted version string
    pub fn version() -> impl Strategy<Value = String> {
        (1u32..100, 0u32..100, 0u32..100)
            .prop_map(|(major, minor, patch)| format!("{major}.{minor}.{patch}"))
    }

    /// Generate a valid SHA256 hash (64 hex characters)
    pub fn sha256_hash() -> impl Strategy<Value = String> {
        "[0-9a-f]{64}"
    }

    /// Generate any phase
    pub fn phase() -> impl Strategy<Value = Phase> {
        (0..Phase::ALL.len()).prop_map(|index| Phase::ALL[index])
    }

    /// Generate an acyclic dependency map with up to `max_nodes` packages.
    ///
    /// Node `i` may only depend on nodes created before it. Names are
    /// assigned in reverse so that alphabetical order disagrees with
    /// creation order.
    pub fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = BTreeMap<String, Vec<String>>> {
        (1..=max_nodes)
            .prop_flat_map(|count| {
                let edges = (0..count)
                    .map(|index| proptest::collection::vec(any::<bool>(), index))
                    .collect::<Vec<_>>();
                (Just(count), edges)
            })
            .prop_map(|(count, edges)| {
                let name = |index: usize| format!("p{:02}", count - 1 - index);
                edges
                    .into_iter()
                    .enumerate()
                    .map(|(index, mask)| {
                        let deps: Vec<String> = mask
                            .into_iter()
                            .enumerate()
                            .filter(|(_, selected)| *selected)
                            .map(|(dep, _)| name(dep))
                            .collect();
                        (name(index), deps)
                    })
                    .collect()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_package_name_generator(name in package_name()) {
            prop_assert!(!name.is_empty());
            prop_assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }

        #[test]
        fn test_version_generator(version in version()) {
            let parts: Vec<&str> = version.split('.').collect();
            prop_assert_eq!(parts.len(), 3);
            for part in parts {
                prop_assert!(part.parse::<u32>().is_ok());
            }
        }

        #[test]
        fn test_sha256_hash_generator(hash in sha256_hash()) {
            prop_assert_eq!(hash.len(), 64);
            prop_assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        }

        #[test]
        fn test_dag_generator_has_no_self_edges(dag in dag_strategy(8)) {
            for (name, deps) in &dag {
                prop_assert!(!deps.contains(name));
                prop_assert!(deps.iter().all(|dep| dag.contains_key(dep)));
            }
        }
    }
}
