//! CLI command implementations for alertsite-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and credential validation
//! - `config`: Configuration file generation
//! - `test`: Single poll cycle against the upstream

pub mod check;
pub mod config;
pub mod test;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use test::command_test;
