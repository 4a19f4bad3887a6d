//! Configuration constants
//!
//! File names, directory names, variable names and built-in defaults.

pub mod defaults;
pub mod names;
