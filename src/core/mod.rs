//! Core business logic module
//!
//! Package resolution and the phased build engine. Side-effecting
//! adapters live in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`phase`] - The fixed, ordered phase list
//! - [`schema`] - Descriptor schema validation
//! - [`package`] - Descriptor loading and defaulting
//! - [`template`] - Build-system templates
//! - [`resolver`] - Discovery and dependency ordering
//! - [`ledger`] - Per-package completed-phase ledger
//! - [`expand`] - Variable substitution and word splitting
//! - [`workspace`] - Destination directory layout
//! - [`stage`] - Source fetch and unpack
//! - [`builder`] - Build execution
//! - [`global_config`] - Global configuration and build settings

pub mod builder;
pub mod expand;
pub mod global_config;
pub mod ledger;
pub mod package;
pub mod phase;
pub mod resolver;
pub mod schema;
pub mod stage;
pub mod template;
pub mod workspace;
