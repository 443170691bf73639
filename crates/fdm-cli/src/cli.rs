//! Command line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "fdm",
    version,
    about = "Normalize source tables into a common event schema",
    long_about = "Normalize heterogeneous source tables into a common event schema.\n\n\
                  Each table gets a person_id, an event_start_date and an optional\n\
                  event_end_date. The dataset build then derives the person and\n\
                  observation_period tables and moves implausible rows into\n\
                  <table>_problems partitions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags and RUST_LOG).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format.
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow identifier values in log output.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build every table and then the dataset.
    Build(BuildArgs),

    /// Show the build stage of every table.
    Status(WorkspaceArgs),

    /// Merge open problem partitions back into their tables.
    Recombine(WorkspaceArgs),

    /// List the problem codes in evaluation order.
    Problems,
}

/// Locations of the inputs and outputs of a build.
///
/// ```text
/// <WORKSPACE>/
///   config.json      build configuration
///   registry.csv     subject registry
///   sources/*.csv    immutable source tables, loaded as `source.<name>`
///   dataset/*.csv    working tables and build outputs
/// ```
#[derive(Args, Clone)]
pub struct WorkspaceArgs {
    /// Workspace folder.
    #[arg(value_name = "WORKSPACE")]
    pub workspace: PathBuf,

    /// Build configuration (default: <WORKSPACE>/config.json).
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Registry table (default: <WORKSPACE>/registry.csv).
    #[arg(long = "registry", value_name = "PATH")]
    pub registry: Option<PathBuf>,

    /// Source table folder (default: <WORKSPACE>/sources).
    #[arg(long = "sources", value_name = "DIR")]
    pub sources: Option<PathBuf>,

    /// Working dataset folder (default: <WORKSPACE>/dataset).
    #[arg(long = "dataset", value_name = "DIR")]
    pub dataset: Option<PathBuf>,
}

#[derive(Args, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Dataset identifier used in logs and the report
    /// (default: the workspace folder name).
    #[arg(long = "dataset-id", value_name = "ID")]
    pub dataset_id: Option<String>,

    /// Only build the tables; skip the dataset build.
    #[arg(long = "tables-only")]
    pub tables_only: bool,

    /// Build the tables and report, but do not write anything back.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Also write the dataset report as JSON.
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
