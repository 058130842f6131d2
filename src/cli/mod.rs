//! Command-line interface for simsweep.
//!
//! Provides commands for running a sweep, re-ranking an existing output tree,
//! and listing the scenarios of the built-in study.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands};
