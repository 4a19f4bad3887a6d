//! Build execution
//!
//! Runs every resolved package, in build order, through the fixed phase
//! list. For each (package, phase) pair:
//!
//! - a phase already in the package's ledger is skipped;
//! - otherwise its commands are expanded and run one at a time, in
//!   declaration order, inside the package's working directory;
//! - once every command succeeded the phase is appended to the ledger,
//!   before the next phase starts.
//!
//! The first failure aborts the run. Phases that completed before it stay
//! in their ledgers, so a re-run resumes at the failed phase.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::names::VAR_SOURCE;
use crate::core::expand::{self, Bindings, ExecutableCommand};
use crate::core::ledger::Ledger;
use crate::core::package::PackageDescriptor;
use crate::core::phase::Phase;
use crate::core::resolver;
use crate::core::stage::{SourceStager, StageOutcome};
use crate::core::workspace::{PackagePaths, Workspace};
use crate::error::{AvbbsError, BuildError, ProcessError};
use crate::infra::filesystem;
use crate::infra::process::{self, Invocation, OutputStream};

/// Options for one build run
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory scanned for package descriptors
    pub root: PathBuf,
    /// Root of the build and install trees
    pub dest: PathBuf,
    /// Global variables (arch, platform, jobs) exported to every command
    pub globals: Bindings,
    /// Clear every package's ledger and build directory first
    pub clean: bool,
    /// Delete the whole destination tree first
    pub clean_all: bool,
    /// Forward command output to this process's stdout/stderr
    pub echo_output: bool,
}

impl BuildOptions {
    pub fn new(root: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dest: dest.into(),
            globals: Bindings::new(),
            clean: false,
            clean_all: false,
            echo_output: true,
        }
    }
}

/// How a single phase ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Already recorded in the ledger
    Skipped,
    /// No commands declared; nothing ran and nothing was recorded
    Empty,
    /// Every command succeeded and the phase was recorded
    Completed { duration: Duration, commands: usize },
}

/// Outcome of one phase of one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub outcome: PhaseOutcome,
}

/// Outcome of one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    pub name: String,
    pub staging: StageOutcome,
    pub phases: Vec<PhaseReport>,
}

impl PackageReport {
    /// Phases whose commands ran during this run
    pub fn completed(&self) -> impl Iterator<Item = Phase> + '_ {
        self.phases
            .iter()
            .filter(|report| matches!(report.outcome, PhaseOutcome::Completed { .. }))
            .map(|report| report.phase)
    }

    /// Phases skipped because the ledger already had them
    pub fn skipped(&self) -> impl Iterator<Item = Phase> + '_ {
        self.phases
            .iter()
            .filter(|report| report.outcome == PhaseOutcome::Skipped)
            .map(|report| report.phase)
    }
}

/// Summary of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Resolved build order
    pub order: Vec<String>,
    /// Per-package results, in build order
    pub packages: Vec<PackageReport>,
    /// Wall-clock time of the run
    pub duration: Duration,
}

impl BuildReport {
    /// Number of phases whose commands ran
    pub fn completed_phases(&self) -> usize {
        self.packages.iter().map(|p| p.completed().count()).sum()
    }

    /// Number of phases skipped thanks to the ledger
    pub fn skipped_phases(&self) -> usize {
        self.packages.iter().map(|p| p.skipped().count()).sum()
    }
}

/// Runs builds for every package under a root
#[derive(Debug, Clone)]
pub struct BuildExecutor {
    options: BuildOptions,
    workspace: Workspace,
    stager: SourceStager,
    ambient: Bindings,
    cancel: CancellationToken,
}

impl BuildExecutor {
    /// Executor using the current process environment as ambient bindings
    pub fn new(options: BuildOptions) -> Self {
        let ambient = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self {
            workspace: Workspace::new(options.dest.clone()),
            options,
            stager: SourceStager::default(),
            ambient,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the ambient environment
    #[must_use]
    pub fn with_ambient(mut self, ambient: Bindings) -> Self {
        self.ambient = ambient;
        self
    }

    /// Use a specific source stager
    #[must_use]
    pub fn with_stager(mut self, stager: SourceStager) -> Self {
        self.stager = stager;
        self
    }

    /// Abort the run when `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this executor's run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Resolve the root and build every package in order
    pub async fn run(&self) -> Result<BuildReport, AvbbsError> {
        let started = Instant::now();
        let resolution = resolver::resolve(&self.options.root)?;

        if self.options.clean_all {
            self.workspace.wipe().map_err(BuildError::from)?;
        }
        let install_dir = self.workspace.ensure_install_dir().map_err(BuildError::from)?;
        debug!("Install directory {}", install_dir.display());

        let mut report = BuildReport {
            order: resolution.order.clone(),
            ..BuildReport::default()
        };
        for descriptor in resolution.ordered() {
            report.packages.push(self.build_package(descriptor).await?);
        }

        report.duration = started.elapsed();
        info!(
            "Built {} package(s) in {:.1}s ({} phase(s) run, {} skipped)",
            report.packages.len(),
            report.duration.as_secs_f64(),
            report.completed_phases(),
            report.skipped_phases()
        );
        Ok(report)
    }

    /// Stage and run every phase of one package
    pub async fn build_package(
        &self,
        descriptor: &PackageDescriptor,
    ) -> Result<PackageReport, BuildError> {
        let paths = self.workspace.package_paths(descriptor);
        let ledger = Ledger::new(&paths.context_dir);

        info!("--- Package {} {}", descriptor.name, descriptor.version);
        debug!("Context directory {}", paths.context_dir.display());
        debug!("Build directory {}", paths.work_dir.display());

        filesystem::create_dir_all(&paths.build_dir)?;
        if self.options.clean {
            ledger.clear()?;
            filesystem::empty_dir(&paths.build_dir)?;
        }

        let staging = self
            .stager
            .prepare(descriptor, &paths, &self.cancel)
            .await
            .map_err(|error| {
                if error.is_cancelled() {
                    BuildError::Cancelled {
                        package: descriptor.name.clone(),
                        phase: None,
                    }
                } else {
                    BuildError::Staging {
                        package: descriptor.name.clone(),
                        error,
                    }
                }
            })?;
        filesystem::create_dir_all(&paths.work_dir)?;

        let bindings = command_bindings(
            &paths,
            staging.archive(),
            &self.ambient,
            &self.options.globals,
        );
        let mut completed = ledger.read()?;
        let mut phases = Vec::with_capacity(Phase::ALL.len());

        for phase in Phase::ALL {
            let outcome = if completed.contains(&phase) {
                info!(">>> [{phase}] {}: skipping, already finished", descriptor.name);
                PhaseOutcome::Skipped
            } else {
                let outcome = self.run_phase(descriptor, phase, &paths, &bindings).await?;
                if matches!(outcome, PhaseOutcome::Completed { .. }) {
                    completed = ledger.append(phase)?;
                }
                outcome
            };
            phases.push(PhaseReport { phase, outcome });
        }

        Ok(PackageReport {
            name: descriptor.name.clone(),
            staging,
            phases,
        })
    }

    async fn run_phase(
        &self,
        descriptor: &PackageDescriptor,
        phase: Phase,
        paths: &PackagePaths,
        bindings: &Bindings,
    ) -> Result<PhaseOutcome, BuildError> {
        let commands = expand::expand(descriptor, phase, bindings).map_err(|error| {
            BuildError::Expand {
                package: descriptor.name.clone(),
                phase,
                error,
            }
        })?;
        if commands.is_empty() {
            return Ok(PhaseOutcome::Empty);
        }

        let started = Instant::now();
        for command in &commands {
            if self.cancel.is_cancelled() {
                return Err(BuildError::Cancelled {
                    package: descriptor.name.clone(),
                    phase: Some(phase),
                });
            }
            debug!(">>> [{phase}] {}: {}", descriptor.name, command.raw);
            self.run_command(descriptor, command, &paths.work_dir).await?;
        }

        let duration = started.elapsed();
        info!(
            ">>> [{phase}] {}: finished after {}ms",
            descriptor.name,
            duration.as_millis()
        );
        Ok(PhaseOutcome::Completed {
            duration,
            commands: commands.len(),
        })
    }

    async fn run_command(
        &self,
        descriptor: &PackageDescriptor,
        command: &ExecutableCommand,
        work_dir: &Path,
    ) -> Result<(), BuildError> {
        let echo = self.options.echo_output;
        let invocation = Invocation {
            program: &command.program,
            args: &command.args,
            env: &command.env,
            cwd: work_dir,
        };

        process::run_streaming(invocation, &self.cancel, |stream, line| {
            debug!(target: "avbbs::output", "{}: {line}", descriptor.name);
            if echo {
                match stream {
                    OutputStream::Stdout => println!("{line}"),
                    OutputStream::Stderr => eprintln!("{line}"),
                }
            }
        })
        .await
        .map_err(|error| match error {
            ProcessError::Cancelled { .. } => BuildError::Cancelled {
                package: descriptor.name.clone(),
                phase: Some(command.phase),
            },
            error => BuildError::CommandFailed {
                package: descriptor.name.clone(),
                phase: command.phase,
                command: command.raw.clone(),
                error,
            },
        })
    }
}

/// Variables available to a package's commands.
///
/// Lowest to highest precedence: derived paths, the ambient environment,
/// global options.
pub fn command_bindings(
    paths: &PackagePaths,
    source: Option<&Path>,
    ambient: &Bindings,
    globals: &Bindings,
) -> Bindings {
    let mut bindings = paths.bindings();
    bindings.insert(
        VAR_SOURCE.to_string(),
        source.map(|p| p.display().to_string()).unwrap_or_default(),
    );
    bindings.extend(ambient.iter().map(|(k, v)| (k.clone(), v.clone())));
    bindings.extend(globals.iter().map(|(k, v)| (k.clone(), v.clone())));
    bindings
}
