//! CLI module for vbench
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::utils::logging::{LogFormat, LogLevel};

pub mod args;
pub mod commands;

pub use args::{BackendsArgs, InspectArgs, MergeArgs, RunArgs};

/// vbench video decoding benchmark
///
/// Sweeps encoder parameters over image datasets and scores random-access
/// decoding of the resulting videos against the original frames.
#[derive(Parser, Debug)]
#[command(name = "vbench")]
#[command(about = "Video encoding/decoding benchmark for frame datasets")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Sweep configuration file (TOML, or YAML by extension)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode, decode and score the configured parameter sweep
    Run(args::RunArgs),
    /// Show what the sweep sees of one dataset
    Inspect(args::InspectArgs),
    /// Concatenate result tables
    Merge(args::MergeArgs),
    /// List decode backends and their capabilities
    Backends(args::BackendsArgs),
}
