//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use std::path::PathBuf;

use super::{AppConfig, PytestConfig};

/// Environment variable prefix
const ENV_PREFIX: &str = "TEST_BATCHER";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Config file from TEST_BATCHER_CONFIG
    pub config_file: Option<String>,
    /// Root directory from TEST_BATCHER_ROOT
    pub root_dir: Option<String>,
    /// Worker count from TEST_BATCHER_WORKERS
    pub workers: Option<usize>,
    /// Batch size from TEST_BATCHER_BATCH_SIZE
    pub batch_size: Option<usize>,
    /// Report directory from TEST_BATCHER_REPORT_DIR
    pub report_dir: Option<String>,
    /// Interpreter from TEST_BATCHER_PYTHON
    pub python: Option<String>,
    /// Verbose from TEST_BATCHER_VERBOSE
    pub verbose: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            config_file: get_env("CONFIG"),
            root_dir: get_env("ROOT"),
            workers: get_env_parse("WORKERS"),
            batch_size: get_env_parse("BATCH_SIZE"),
            report_dir: get_env("REPORT_DIR"),
            python: get_env("PYTHON"),
            verbose: get_env_bool("VERBOSE"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.config_file.is_some()
            || self.root_dir.is_some()
            || self.workers.is_some()
            || self.batch_size.is_some()
            || self.report_dir.is_some()
            || self.python.is_some()
            || self.verbose.is_some()
    }

    /// Overlay the set variables onto a loaded configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(root) = &self.root_dir {
            config.root_dir = PathBuf::from(root);
        }
        if let Some(workers) = self.workers.filter(|w| *w > 0) {
            config.max_workers = workers;
        }
        if let Some(batch_size) = self.batch_size.filter(|b| *b > 0) {
            config.batch_size = batch_size;
        }
        if let Some(dir) = &self.report_dir {
            config.report_dir = PathBuf::from(dir);
        }
        if let Some(python) = &self.python {
            // Keep `-m pytest` but swap the interpreter
            config.pytest = PytestConfig {
                program: python.clone(),
                args: config.pytest.args.clone(),
            };
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_CONFIG:      {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_ROOT:        {:?}", ENV_PREFIX, self.root_dir);
        println!("  {}_WORKERS:     {:?}", ENV_PREFIX, self.workers);
        println!("  {}_BATCH_SIZE:  {:?}", ENV_PREFIX, self.batch_size);
        println!("  {}_REPORT_DIR:  {:?}", ENV_PREFIX, self.report_dir);
        println!("  {}_PYTHON:      {:?}", ENV_PREFIX, self.python);
        println!("  {}_VERBOSE:     {:?}", ENV_PREFIX, self.verbose);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all TEST_BATCHER environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_CONFIG      Path to configuration file");
    println!("  {ENV_PREFIX}_ROOT        Directory pytest runs in");
    println!("  {ENV_PREFIX}_WORKERS     Maximum concurrent tests per batch");
    println!("  {ENV_PREFIX}_BATCH_SIZE  Maximum tests per batch");
    println!("  {ENV_PREFIX}_REPORT_DIR  Directory for JSON/Markdown reports");
    println!("  {ENV_PREFIX}_PYTHON      Python interpreter used to launch pytest");
    println!("  {ENV_PREFIX}_VERBOSE     Enable debug logging (true/false)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_WORKERS=4");
    println!("  export {ENV_PREFIX}_PYTHON=.venv/bin/python");
    println!("  test-batcher run tests/unit");
}
