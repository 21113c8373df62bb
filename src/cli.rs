// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Fallback worker count when CPU detection comes back with nothing usable.
const FALLBACK_WORKERS: usize = 4;

/// Command-line arguments for `workpanel`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "workpanel",
    version,
    about = "Run and monitor multi-step shell workflows in an interactive dashboard.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workflow file (CSV, or YAML with a .yaml/.yml extension).
    #[arg(value_name = "WORKFLOW")]
    pub workflow: PathBuf,

    /// Maximum number of tasks to run in parallel.
    ///
    /// Defaults to the number of logical CPUs.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Title shown in the dashboard header.
    #[arg(long, value_name = "STR")]
    pub title: Option<String>,

    /// Convert a CSV workflow to YAML, write it to PATH, and exit.
    #[arg(long, value_name = "PATH")]
    pub to_yaml: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WORKPANEL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// Resolve the worker bound: explicit flag, else logical CPU count,
    /// else a small fixed fallback. Values below 1 are treated as 1.
    pub fn effective_workers(&self) -> usize {
        let n = self.workers.unwrap_or_else(|| {
            let detected = num_cpus::get();
            if detected == 0 {
                FALLBACK_WORKERS
            } else {
                detected
            }
        });
        n.max(1)
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
