//! Command-line interface for provisioning benchmark datasets.
//!
//! The CLI forwards its trailing arguments to the generator registry, runs the
//! selected generator against a host device, and summarises the result.

mod commands;

pub use commands::{Cli, CliError, DatasetSummary, ExecutionSummary, render_summary, run_cli};

#[cfg(test)]
mod tests;
