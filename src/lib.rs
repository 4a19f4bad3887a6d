//! avbbs - A very basic build system
//!
//! Builds a tree of source packages in dependency order. Every package runs
//! the same fixed sequence of build phases as external commands, and each
//! completed phase is recorded in a per-package ledger so an interrupted or
//! failed run resumes where it stopped.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Descriptors, dependency resolution, ledger, expansion, execution
//! - [`infra`] - Infrastructure layer (network, archives, filesystem, processes)
//! - [`config`] - Constants and defaults
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
