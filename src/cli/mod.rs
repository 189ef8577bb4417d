//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Priority-ordered batching and parallel execution for pytest suites
#[derive(Parser, Debug)]
#[command(name = "test-batcher")]
#[command(version)]
#[command(about = "Collect, batch and run pytest suites in parallel")]
#[command(long_about = None)]
pub struct Args {
    /// Command to run; `run` with defaults when omitted
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides --verbose
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Also write log output to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect, batch and run tests, then write reports
    Run(RunArgs),

    /// Discover tests and show the batch plan without running anything
    Collect(CollectArgs),

    /// Inspect and export stored reports
    Reports(ReportsArgs),

    /// Show or create configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Test files or directories relative to the root (default: configured paths)
    pub paths: Vec<String>,

    /// Maximum concurrent tests inside a parallel batch
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Maximum tests per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Directory for JSON and Markdown reports
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Directory pytest runs in
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Console output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            workers: None,
            batch_size: None,
            report_dir: None,
            root: None,
            format: "table".to_string(),
        }
    }
}

/// Arguments for the collect command
#[derive(Parser, Debug)]
pub struct CollectArgs {
    /// Test files or directories relative to the root (default: configured paths)
    pub paths: Vec<String>,

    /// Directory pytest runs in
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Maximum tests per batch in the plan
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Skip the batch plan
    #[arg(long)]
    pub no_plan: bool,
}

/// Arguments for the reports command
#[derive(Parser, Debug)]
pub struct ReportsArgs {
    /// Report directory (default: configured report_dir)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Show the latest report in full
    #[arg(short, long)]
    pub latest: bool,

    /// Export failing tests of the latest report (.csv or .json)
    #[arg(short, long)]
    pub export: Option<PathBuf>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show the effective configuration
    #[arg(short, long)]
    pub show: bool,

    /// Write an example configuration file
    #[arg(short, long)]
    pub init: Option<PathBuf>,

    /// List supported environment variables
    #[arg(short, long)]
    pub env: bool,
}
