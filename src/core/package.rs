//! Package descriptor handling
//!
//! Loads `build.json` descriptors from disk, validates them against the
//! descriptor schema, fills in defaults and applies the declared template.
//!
//! Descriptor example:
//!
//! ```json
//! {
//!   "name": "zlib",
//!   "version": "1.3.1",
//!   "source": "https://zlib.net/zlib-${version}.tar.gz",
//!   "licenses": ["Zlib"],
//!   "build": {
//!     "context": "zlib-${version}",
//!     "depends": ["musl"],
//!     "commands": {
//!       "configure": ["./configure --prefix=/usr"],
//!       "build": [{ "command": "make", "env": { "CFLAGS": "-O2" } }]
//!     }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::config::names::DESCRIPTOR_FILE;
use crate::core::expand::{substitute, Bindings};
use crate::core::phase::Phase;
use crate::core::schema;
use crate::core::template::Template;
use crate::error::{PackageError, SchemaError, SchemaViolation};

/// One shell invocation within a phase
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawCommand")]
pub struct CommandSpec {
    /// Raw command line, before variable substitution
    pub command_line: String,
    /// Variables merged over the build bindings for this command only
    pub env_overrides: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Command without environment overrides
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            env_overrides: BTreeMap::new(),
        }
    }

    /// Add an environment override
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(key.into(), value.into());
        self
    }
}

/// Commands are written either as a bare string or as `{command, env}`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCommand {
    Line(String),
    Full {
        command: String,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
}

impl From<RawCommand> for CommandSpec {
    fn from(raw: RawCommand) -> Self {
        match raw {
            RawCommand::Line(command_line) => Self::new(command_line),
            RawCommand::Full { command, env } => Self {
                command_line: command,
                env_overrides: env,
            },
        }
    }
}

/// On-disk shape, only read after schema validation passed
#[derive(Deserialize)]
struct RawDescriptor {
    name: String,
    version: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    template: Option<Template>,
    #[serde(default)]
    licenses: Vec<String>,
    #[serde(default)]
    autoconf: RawAutoconf,
    #[serde(default)]
    build: RawBuild,
}

#[derive(Deserialize, Default)]
struct RawAutoconf {
    #[serde(default)]
    flags: Vec<String>,
}

#[derive(Deserialize, Default)]
struct RawBuild {
    #[serde(default)]
    context: String,
    #[serde(default)]
    depends: Vec<String>,
    #[serde(default)]
    commands: BTreeMap<Phase, Vec<CommandSpec>>,
}

/// Identity and build recipe of one package
///
/// After loading, `phase_commands` holds an entry for every phase in
/// [`Phase::ALL`], possibly empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// Unique package name, used as graph node and ledger key
    pub name: String,
    /// Package version
    pub version: String,
    /// Source archive URL; may reference `${name}` and `${version}`
    pub source: Option<String>,
    /// Expected SHA256 of the source archive
    pub sha256: Option<String>,
    /// Build-system template applied at load time
    pub template: Option<Template>,
    /// License identifiers
    pub licenses: Vec<String>,
    /// Extra configure flags used by the autotools template
    pub autoconf_flags: Vec<String>,
    /// Subpath of the extracted source tree commands run in
    pub build_context: String,
    /// Names of packages this one depends on
    pub dependencies: BTreeSet<String>,
    /// Commands per phase
    pub phase_commands: BTreeMap<Phase, Vec<CommandSpec>>,
    /// Phases the descriptor declared explicitly
    pub declared_phases: BTreeSet<Phase>,
    /// Directory the descriptor was loaded from
    pub directory: PathBuf,
}

impl PackageDescriptor {
    /// Descriptor with defaults: no source, no dependencies, every phase empty
    pub fn new(name: impl Into<String>, version: impl Into<String>, directory: PathBuf) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source: None,
            sha256: None,
            template: None,
            licenses: Vec::new(),
            autoconf_flags: Vec::new(),
            build_context: String::new(),
            dependencies: BTreeSet::new(),
            phase_commands: Phase::ALL.into_iter().map(|phase| (phase, Vec::new())).collect(),
            declared_phases: BTreeSet::new(),
            directory,
        }
    }

    /// Commands registered for a phase
    pub fn commands(&self, phase: Phase) -> &[CommandSpec] {
        self.phase_commands
            .get(&phase)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The descriptor's own fields, usable in `source` and `build.context`
    pub fn field_bindings(&self) -> Bindings {
        Bindings::from([
            ("name".to_string(), self.name.clone()),
            ("version".to_string(), self.version.clone()),
        ])
    }

    /// Source URL with descriptor fields substituted
    pub fn resolved_source(&self) -> Option<String> {
        self.source
            .as_deref()
            .map(|source| substitute(source, &self.field_bindings()))
    }

    /// Build context with descriptor fields substituted
    pub fn resolved_context(&self) -> String {
        substitute(&self.build_context, &self.field_bindings())
    }

    fn from_raw(raw: RawDescriptor, directory: PathBuf) -> Self {
        let mut descriptor = Self::new(raw.name, raw.version, directory);
        descriptor.source = raw.source;
        descriptor.sha256 = raw.sha256;
        descriptor.template = raw.template;
        descriptor.licenses = raw.licenses;
        descriptor.autoconf_flags = raw.autoconf.flags;
        descriptor.build_context = raw.build.context;
        descriptor.dependencies = raw.build.depends.into_iter().collect();
        for (phase, commands) in raw.build.commands {
            descriptor.declared_phases.insert(phase);
            descriptor.phase_commands.insert(phase, commands);
        }
        descriptor
    }
}

/// Path of the descriptor file inside a package directory
pub fn descriptor_path(directory: &Path) -> PathBuf {
    directory.join(DESCRIPTOR_FILE)
}

/// Load, validate and default the descriptor in `directory`
pub fn load(directory: &Path) -> Result<PackageDescriptor, PackageError> {
    let path = descriptor_path(directory);
    let content = std::fs::read_to_string(&path).map_err(|e| PackageError::Read {
        path: path.clone(),
        error: e.to_string(),
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|e| PackageError::InvalidJson {
        path: path.clone(),
        error: e.to_string(),
    })?;

    from_value(value, directory)
}

/// Validate and default an already parsed descriptor
pub fn from_value(value: Value, directory: &Path) -> Result<PackageDescriptor, PackageError> {
    let validation = schema::validate(&value);
    if !validation.is_valid() {
        return Err(SchemaError {
            package_dir: directory.to_path_buf(),
            errors: validation.errors,
        }
        .into());
    }

    let raw: RawDescriptor = serde_json::from_value(value).map_err(|e| SchemaError {
        package_dir: directory.to_path_buf(),
        errors: vec![SchemaViolation::new("", e.to_string())],
    })?;

    let descriptor = PackageDescriptor::from_raw(raw, directory.to_path_buf());
    Ok(match descriptor.template {
        Some(template) => template.apply(descriptor),
        None => descriptor,
    })
}
