//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Roots searched when no paths are given
pub const DEFAULT_TEST_PATHS: &[&str] = &["tests", "netra_backend/tests", "auth_service/tests"];

/// Upper bound for the default worker count
const MAX_DEFAULT_WORKERS: usize = 8;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory pytest runs in; test paths are relative to it
    pub root_dir: PathBuf,

    /// Files or directories to collect from
    pub test_paths: Vec<String>,

    /// Maximum concurrent tests inside a parallel batch
    pub max_workers: usize,

    /// Maximum tests per batch
    pub batch_size: usize,

    /// Timeout for `--collect-only` per file
    pub collect_timeout_secs: u64,

    /// Where JSON and Markdown reports are written
    pub report_dir: PathBuf,

    /// Test tool invocation
    pub pytest: PytestConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            test_paths: DEFAULT_TEST_PATHS.iter().map(|p| p.to_string()).collect(),
            max_workers: default_workers(),
            batch_size: 50,
            collect_timeout_secs: 10,
            report_dir: PathBuf::from("test_reports"),
            pytest: PytestConfig::default(),
        }
    }
}

/// Number of CPUs, capped
pub fn default_workers() -> usize {
    cpu_count().min(MAX_DEFAULT_WORKERS)
}

pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// How the underlying test tool is launched
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PytestConfig {
    /// Executable, e.g. `python`
    pub program: String,

    /// Arguments placed before the per-invocation ones
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for PytestConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["-m".to_string(), "pytest".to_string()],
        }
    }
}

impl PytestConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Base command rooted at `root_dir` with piped output.
    ///
    /// The child is killed when the returned command's child handle is dropped,
    /// so abandoning a timed-out wait never leaves a stray process behind.
    pub fn command(&self, root_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(root_dir)
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Human readable form for logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
