//! Build-system templates
//!
//! A template pre-fills phase commands for a known build system. Templates
//! form a closed registry: the descriptor schema only accepts names listed
//! in [`Template::ALL`], so dispatch never fails at build time.
//!
//! Template commands only land in phases the descriptor did not declare.
//! A declared phase keeps its own command list as-is, even when that list
//! is empty.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::package::{CommandSpec, PackageDescriptor};
use crate::core::phase::Phase;

/// Flags passed to every autotools `configure` invocation
pub const AUTOTOOLS_CONFIGURE_FLAGS: &[&str] = &[
    "--prefix=/usr",
    "--sysconfdir=/etc",
    "--libdir=/usr/lib",
    "--libexecdir=/usr/lib",
    "--localstatedir=/var",
];

/// Registered templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    /// GNU autotools: autoconf, configure, make, make install
    Autotools,
}

impl Template {
    /// Every registered template
    pub const ALL: [Template; 1] = [Template::Autotools];

    /// Name used in descriptors
    pub fn as_str(self) -> &'static str {
        match self {
            Template::Autotools => "autotools",
        }
    }

    /// Comma separated list of registered names, for error messages
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(|template| template.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Default phase commands this template provides for a descriptor
    pub fn phase_defaults(self, descriptor: &PackageDescriptor) -> BTreeMap<Phase, Vec<CommandSpec>> {
        match self {
            Template::Autotools => autotools_defaults(descriptor),
        }
    }

    /// Return a copy of `descriptor` with template commands filled into
    /// every phase the descriptor did not declare
    pub fn apply(self, descriptor: PackageDescriptor) -> PackageDescriptor {
        let defaults = self.phase_defaults(&descriptor);
        merge_phase_defaults(descriptor, defaults)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no registered template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown template '{0}' (expected one of: {names})", names = Template::names())]
pub struct UnknownTemplate(pub String);

impl FromStr for Template {
    type Err = UnknownTemplate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|template| template.as_str() == s)
            .ok_or_else(|| UnknownTemplate(s.to_string()))
    }
}

/// Field-by-field merge of template phase commands under a descriptor.
///
/// Declared phases are never touched; lists are replaced wholesale, never
/// concatenated.
fn merge_phase_defaults(
    mut descriptor: PackageDescriptor,
    defaults: BTreeMap<Phase, Vec<CommandSpec>>,
) -> PackageDescriptor {
    for (phase, commands) in defaults {
        if !descriptor.declared_phases.contains(&phase) {
            descriptor.phase_commands.insert(phase, commands);
        }
    }
    descriptor
}

fn autotools_defaults(descriptor: &PackageDescriptor) -> BTreeMap<Phase, Vec<CommandSpec>> {
    let flags = AUTOTOOLS_CONFIGURE_FLAGS
        .iter()
        .map(|flag| (*flag).to_string())
        .chain(descriptor.autoconf_flags.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");

    BTreeMap::from([
        (
            Phase::Configure,
            vec![
                CommandSpec::new("autoconf -f -i -v"),
                CommandSpec::new(format!("$AVBBS_BUILD_DIR/configure {flags}")),
            ],
        ),
        (Phase::Build, vec![CommandSpec::new("make")]),
        (
            Phase::Install,
            vec![CommandSpec::new("make install DESTDIR=$AVBBS_INSTALL_DIR")],
        ),
        (Phase::Clean, vec![CommandSpec::new("make distclean")]),
    ])
}
