//! Run report generation
//!
//! Every run leaves a machine-readable JSON report and a Markdown summary in
//! the report directory, whatever the outcome of the tests.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::config::{cpu_count, PytestConfig};
use crate::models::{BatchSummary, FailedTest, RunResults, RunSummary};

/// Failures listed per category in the Markdown summary
const FAILURES_PER_CATEGORY: usize = 10;

const VERSION_TIMEOUT_SECS: u64 = 5;

pub const REPORT_PREFIX: &str = "test_report_";
pub const SUMMARY_PREFIX: &str = "summary_";

/// Where and on what a run happened
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub timestamp: DateTime<Local>,
    pub python_version: Option<String>,
    pub platform: String,
    pub cpu_count: usize,
    pub workers_used: usize,
    pub tool_version: String,
}

impl ReportMetadata {
    pub fn new(workers_used: usize, python_version: Option<String>) -> Self {
        Self {
            timestamp: Local::now(),
            python_version,
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            cpu_count: cpu_count(),
            workers_used,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Timestamp as used in report file names
    pub fn stamp(&self) -> String {
        self.timestamp.format("%Y%m%d_%H%M%S").to_string()
    }
}

/// Contents of `test_report_<timestamp>.json`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestReport {
    pub batches: Vec<BatchSummary>,
    pub summary: RunSummary,
    pub failed_tests: Vec<FailedTest>,
    pub metadata: ReportMetadata,
}

impl TestReport {
    pub fn new(results: &RunResults, metadata: ReportMetadata) -> Self {
        Self {
            batches: results.batches.clone(),
            summary: results.summary.clone(),
            failed_tests: results.failed_tests.clone(),
            metadata,
        }
    }
}

/// Files written for one run
#[derive(Clone, Debug)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Writes run reports into a directory
pub struct ReportGenerator {
    report_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
        }
    }

    /// Write the JSON report and the Markdown summary
    pub fn generate(&self, report: &TestReport) -> Result<ReportPaths> {
        fs::create_dir_all(&self.report_dir).with_context(|| {
            format!(
                "Failed to create report directory {}",
                self.report_dir.display()
            )
        })?;

        let stamp = report.metadata.stamp();
        let json = self.report_dir.join(format!("{REPORT_PREFIX}{stamp}.json"));
        let markdown = self.report_dir.join(format!("{SUMMARY_PREFIX}{stamp}.md"));

        let file = File::create(&json)
            .with_context(|| format!("Failed to create {}", json.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), report)
            .context("Failed to write JSON report")?;

        fs::write(&markdown, markdown_summary(report))
            .with_context(|| format!("Failed to write {}", markdown.display()))?;

        debug!("Wrote {} and {}", json.display(), markdown.display());
        Ok(ReportPaths { json, markdown })
    }
}

/// Render the human-readable summary of a run
pub fn markdown_summary(report: &TestReport) -> String {
    let mut output = String::new();
    let summary = &report.summary;
    let meta = &report.metadata;

    writeln!(output, "# Test Execution Summary\n").unwrap();
    writeln!(
        output,
        "**Generated:** {}",
        meta.timestamp.format("%Y-%m-%d %H:%M:%S")
    )
    .unwrap();
    writeln!(output, "**Platform:** {}", meta.platform).unwrap();
    if let Some(version) = &meta.python_version {
        writeln!(output, "**Python:** {version}").unwrap();
    }
    writeln!(
        output,
        "**Workers:** {} of {} CPUs\n",
        meta.workers_used, meta.cpu_count
    )
    .unwrap();

    writeln!(output, "## Results\n").unwrap();
    writeln!(output, "| Metric | Value |").unwrap();
    writeln!(output, "|--------|-------|").unwrap();
    writeln!(output, "| Total Tests | {} |", summary.total_tests).unwrap();
    writeln!(output, "| Completed | {} |", summary.completed).unwrap();
    writeln!(output, "| Passed | {} |", summary.passed).unwrap();
    writeln!(output, "| Failed | {} |", summary.failed).unwrap();
    writeln!(output, "| Errors | {} |", summary.errors).unwrap();
    writeln!(output, "| Timeouts | {} |", summary.timeouts).unwrap();
    writeln!(output, "| Success Rate | {:.1}% |", summary.success_rate).unwrap();
    writeln!(output, "| Total Duration | {:.2}s |", summary.total_duration).unwrap();

    if !report.batches.is_empty() {
        writeln!(output, "\n## Batches\n").unwrap();
        writeln!(
            output,
            "| Batch | Category | Priority | Mode | Tests | Passed | Failed | Errors | Timeouts | Duration |"
        )
        .unwrap();
        writeln!(
            output,
            "|-------|----------|----------|------|-------|--------|--------|--------|----------|----------|"
        )
        .unwrap();
        for batch in &report.batches {
            writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {:.2}s |",
                batch.batch_id,
                batch.category,
                batch.priority,
                if batch.parallel { "parallel" } else { "sequential" },
                batch.total,
                batch.passed,
                batch.failed,
                batch.errors,
                batch.timeouts,
                batch.duration
            )
            .unwrap();
        }
    }

    if !report.failed_tests.is_empty() {
        writeln!(output, "\n## Failed Tests\n").unwrap();

        for (category, failures) in failures_by_category(&report.failed_tests) {
            writeln!(output, "### {} ({})\n", category, failures.len()).unwrap();
            for failure in failures.iter().take(FAILURES_PER_CATEGORY) {
                writeln!(
                    output,
                    "- `{}` - {}: {}",
                    failure.path,
                    failure.status,
                    failure.error.as_deref().unwrap_or("no message")
                )
                .unwrap();
            }
            if failures.len() > FAILURES_PER_CATEGORY {
                writeln!(
                    output,
                    "- ... and {} more",
                    failures.len() - FAILURES_PER_CATEGORY
                )
                .unwrap();
            }
            writeln!(output).unwrap();
        }
    }

    output
}

/// Failures grouped by category, categories in order of first failure
fn failures_by_category(failed: &[FailedTest]) -> Vec<(&str, Vec<&FailedTest>)> {
    let mut groups: Vec<(&str, Vec<&FailedTest>)> = Vec::new();
    for failure in failed {
        match groups.iter_mut().find(|(c, _)| *c == failure.category) {
            Some((_, list)) => list.push(failure),
            None => groups.push((failure.category.as_str(), vec![failure])),
        }
    }
    groups
}

/// Best-effort `<program> --version` of the test interpreter
pub async fn interpreter_version(pytest: &PytestConfig) -> Option<String> {
    let output = tokio::process::Command::new(&pytest.program)
        .arg("--version")
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(Duration::from_secs(VERSION_TIMEOUT_SECS), output).await {
        Ok(Ok(output)) if output.status.success() => {
            // Older interpreters print the version on stderr
            let text = if output.stdout.is_empty() {
                output.stderr
            } else {
                output.stdout
            };
            let version = String::from_utf8_lossy(&text)
                .lines()
                .next()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty());
            debug!("Interpreter version: {:?}", version);
            version
        }
        Ok(Ok(output)) => {
            debug!("{} --version exited with {}", pytest.program, output.status);
            None
        }
        Ok(Err(e)) => {
            debug!("Failed to query {} version: {}", pytest.program, e);
            None
        }
        Err(_) => None,
    }
}
