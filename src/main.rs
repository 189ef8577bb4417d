//! test-batcher - priority-ordered batching and parallel execution for pytest
//!
//! Discovers pytest tests, categorizes them by location, groups them into
//! priority-ordered batches and runs each batch sequentially or on a bounded
//! worker pool, one subprocess per test. Every run writes a JSON report and
//! a Markdown summary; the exit code is 0 only when no test failed.
//!
//! ## Usage
//!
//! ```bash
//! # Collect from the default roots, run everything, write reports
//! test-batcher
//!
//! # Run selected paths with 4 workers and smaller batches
//! test-batcher run tests/unit tests/api --workers 4 --batch-size 20
//!
//! # Show what would run, and how it would be batched
//! test-batcher collect tests
//!
//! # Inspect the last run and export its failures
//! test-batcher reports --latest --export failures.csv
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, warn};

mod cli;
mod collector;
mod config;
mod executor;
mod models;
mod output;
mod results;
mod utils;

use cli::Args;
use collector::TestCollector;
use config::{print_env_help, AppConfig, ConfigFile, EnvConfig};
use executor::{create_batches, BatchProcessor, TestExecutor, TestRunner};
use output::{OutputFormat, ResultFormatter};
use results::{
    export_failures, interpreter_version, markdown_summary, ExportFormat, ReportGenerator,
    ReportMetadata, ReportStore, TestReport,
};
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let level = match args.log_level.as_deref().and_then(LogLevel::from_str) {
        Some(level) => level,
        None if args.verbose || env.verbose == Some(true) => LogLevel::Debug,
        None => LogLevel::Info,
    };
    init_logger(level, args.log_file.as_deref())?;

    let config = load_config(args.config.as_ref(), &env)?;

    match args.command {
        None => run_tests(config, cli::RunArgs::default()).await,
        Some(cli::Command::Run(run_args)) => run_tests(config, run_args).await,
        Some(cli::Command::Collect(collect_args)) => {
            collect_tests(config, collect_args).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(cli::Command::Reports(reports_args)) => {
            show_reports(&config, reports_args)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(cli::Command::Config(config_args)) => {
            manage_config(&config, &env, config_args)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Configuration file first, then environment overrides.
///
/// CLI flags are applied by each command on top of the result.
fn load_config(explicit: Option<&PathBuf>, env: &EnvConfig) -> Result<AppConfig> {
    let path = explicit
        .cloned()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));

    let mut config = match path {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            ConfigFile::load(&path)?.app
        }
        None => ConfigFile::load_default()?.app,
    };

    env.apply(&mut config);
    Ok(config)
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    OutputFormat::from_str(format).ok_or_else(|| anyhow!("Unknown output format: {format}"))
}

/// Plain output when stdout is redirected
fn formatter_for(format: OutputFormat) -> ResultFormatter {
    let formatter = ResultFormatter::new(format);
    if std::io::stdout().is_terminal() {
        formatter
    } else {
        formatter.no_color()
    }
}

fn override_root(config: &mut AppConfig, root: Option<PathBuf>) {
    if let Some(root) = root {
        config.root_dir = root;
    }
}

async fn run_tests(mut config: AppConfig, args: cli::RunArgs) -> Result<ExitCode> {
    let formatter = formatter_for(parse_format(&args.format)?);

    override_root(&mut config, args.root);
    if let Some(workers) = args.workers.filter(|w| *w > 0) {
        config.max_workers = workers;
    }
    if let Some(batch_size) = args.batch_size.filter(|b| *b > 0) {
        config.batch_size = batch_size;
    }
    if let Some(report_dir) = args.report_dir {
        config.report_dir = report_dir;
    }

    let paths = if args.paths.is_empty() {
        config.test_paths.clone()
    } else {
        args.paths
    };

    info!(
        "Collecting tests from {} under {} ({})",
        paths.join(", "),
        config.root_dir.display(),
        config.pytest.display()
    );

    let mut collector = TestCollector::new(config.pytest.clone(), &config.root_dir)
        .with_timeout(config.collect_timeout_secs);
    collector.collect_tests(&paths).await;
    let tests = collector.into_tests();
    if tests.is_empty() {
        warn!("No tests collected");
    }

    let runner = TestRunner::new(config.pytest.clone(), &config.root_dir);
    let processor = BatchProcessor::new(TestExecutor::new(runner, config.max_workers))
        .with_batch_size(config.batch_size);

    let (results, python_version) = futures::join!(
        processor.process_all(tests),
        interpreter_version(&config.pytest)
    );

    let report = TestReport::new(
        &results,
        ReportMetadata::new(processor.workers(), python_version),
    );
    let paths = ReportGenerator::new(&config.report_dir)
        .generate(&report)
        .context("Failed to write reports")?;
    info!("Report saved to {}", paths.json.display());
    info!("Summary saved to {}", paths.markdown.display());

    println!("{}", formatter.format_run(&results));

    if results.failed_tests.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

async fn collect_tests(mut config: AppConfig, args: cli::CollectArgs) -> Result<()> {
    let format = parse_format(&args.format)?;
    let formatter = formatter_for(format);

    override_root(&mut config, args.root);
    let batch_size = args
        .batch_size
        .filter(|b| *b > 0)
        .unwrap_or(config.batch_size);
    let paths = if args.paths.is_empty() {
        config.test_paths.clone()
    } else {
        args.paths
    };

    let mut collector = TestCollector::new(config.pytest.clone(), &config.root_dir)
        .with_timeout(config.collect_timeout_secs);
    collector.collect_tests(&paths).await;
    let tests = collector.into_tests();

    match format {
        // The plan already lists every test with its category and priority
        OutputFormat::Json | OutputFormat::JsonPretty if !args.no_plan => {
            println!("{}", formatter.format_plan(&create_batches(tests, batch_size)));
        }
        OutputFormat::Table | OutputFormat::Summary if !args.no_plan => {
            println!("{}", formatter.format_tests(&tests));
            println!("Batch plan (batch size {batch_size}):\n");
            println!("{}", formatter.format_plan(&create_batches(tests, batch_size)));
        }
        _ => println!("{}", formatter.format_tests(&tests)),
    }

    Ok(())
}

fn show_reports(config: &AppConfig, args: cli::ReportsArgs) -> Result<()> {
    let store = ReportStore::new(args.dir.unwrap_or_else(|| config.report_dir.clone()));

    if !args.latest && args.export.is_none() {
        let reports = store.list()?;
        println!("{}", formatter_for(OutputFormat::Table).format_reports(&reports));
        return Ok(());
    }

    let Some((path, report)) = store.latest()? else {
        println!("No reports found in {}", store.dir().display());
        return Ok(());
    };

    if args.latest {
        println!("Latest report: {}\n", path.display());
        println!("{}", markdown_summary(&report));
    }

    if let Some(export) = args.export {
        let format = ExportFormat::from_extension(&export).ok_or_else(|| {
            anyhow!(
                "Cannot infer export format from {} (use .csv or .json)",
                export.display()
            )
        })?;
        export_failures(&report, &export, format)?;
        println!(
            "✓ Exported {} failed tests to {}",
            report.failed_tests.len(),
            export.display()
        );
    }

    Ok(())
}

fn manage_config(config: &AppConfig, env: &EnvConfig, args: cli::ConfigArgs) -> Result<()> {
    if let Some(path) = &args.init {
        if path.exists() {
            bail!("Configuration file already exists: {}", path.display());
        }
        ConfigFile::example().save(path)?;
        println!("✓ Configuration file created: {}", path.display());
        println!("\nEdit the file to customize your settings.");
    }

    if args.env {
        print_env_help();
        println!();
        if env.has_any() {
            env.print_summary();
        } else {
            println!("No TEST_BATCHER_* variables are set");
        }
    }

    if args.show || (args.init.is_none() && !args.env) {
        let effective = ConfigFile {
            app: config.clone(),
            ..ConfigFile::default()
        };
        let yaml = serde_yaml::to_string(&effective).context("Failed to render configuration")?;
        println!("{yaml}");
    }

    Ok(())
}
