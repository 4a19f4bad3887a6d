//! Build phases
//!
//! Every package runs the same fixed, ordered list of phases. The order of
//! [`Phase::ALL`] is the execution order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One named stage of the package build lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Fetch,
    PreConfigure,
    Configure,
    PostConfigure,
    PreBuild,
    Build,
    PostBuild,
    PreInstall,
    Install,
    PostInstall,
    Clean,
}

impl Phase {
    /// All phases in execution order
    pub const ALL: [Phase; 11] = [
        Phase::Fetch,
        Phase::PreConfigure,
        Phase::Configure,
        Phase::PostConfigure,
        Phase::PreBuild,
        Phase::Build,
        Phase::PostBuild,
        Phase::PreInstall,
        Phase::Install,
        Phase::PostInstall,
        Phase::Clean,
    ];

    /// Name used in descriptors and ledgers
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Fetch => "fetch",
            Phase::PreConfigure => "pre-configure",
            Phase::Configure => "configure",
            Phase::PostConfigure => "post-configure",
            Phase::PreBuild => "pre-build",
            Phase::Build => "build",
            Phase::PostBuild => "post-build",
            Phase::PreInstall => "pre-install",
            Phase::Install => "install",
            Phase::PostInstall => "post-install",
            Phase::Clean => "clean",
        }
    }

    /// Comma separated list of every phase name, for error messages
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(|phase| phase.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known phase
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown phase '{0}' (expected one of: {names})", names = Phase::names())]
pub struct UnknownPhase(pub String);

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_phase_order_is_lifecycle_order() {
        let configure = Phase::ALL.iter().position(|p| *p == Phase::Configure).unwrap();
        let build = Phase::ALL.iter().position(|p| *p == Phase::Build).unwrap();
        let install = Phase::ALL.iter().position(|p| *p == Phase::Install).unwrap();

        assert_eq!(Phase::ALL[0], Phase::Fetch);
        assert!(configure < build && build < install);
        assert_eq!(Phase::ALL[Phase::ALL.len() - 1], Phase::Clean);
    }

    #[test]
    fn test_ord_matches_execution_order() {
        let mut sorted = Phase::ALL;
        sorted.sort();
        assert_eq!(sorted, Phase::ALL);
    }

    #[test]
    fn test_serde_uses_descriptor_names() {
        let json = serde_json::to_string(&Phase::PreConfigure).unwrap();
        assert_eq!(json, "\"pre-configure\"");

        let phase: Phase = serde_json::from_str("\"post-install\"").unwrap();
        assert_eq!(phase, Phase::PostInstall);
    }

    #[test]
    fn test_unknown_phase_is_rejected() {
        let err = "compile".parse::<Phase>().unwrap_err();
        assert!(err.to_string().contains("compile"));
        assert!(err.to_string().contains("pre-configure"));
    }

    proptest! {
        #[test]
        fn prop_name_parses_back(index in 0usize..Phase::ALL.len()) {
            let phase = Phase::ALL[index];
            prop_assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
            prop_assert_eq!(phase.to_string(), phase.as_str());
        }
    }
}
