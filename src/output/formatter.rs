//! Console formatters for collected tests, batch plans and run results
//!
//! Provides table, JSON, CSV and summary output.

use serde::Serialize;

use crate::models::{RunResults, TestBatch, TestCase, TestStatus};
use crate::results::ReportInfo;

/// Failures printed at the end of a table-formatted run
const MAX_FAILURES_SHOWN: usize = 20;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if self.colorize {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn status_label(&self, status: TestStatus) -> String {
        let label = format!("{} {}", status.symbol(), status);
        match status {
            TestStatus::Passed => self.paint(&label, "32"),
            TestStatus::Failed | TestStatus::Error => self.paint(&label, "31"),
            TestStatus::Timeout | TestStatus::Flaky => self.paint(&label, "33"),
            _ => label,
        }
    }

    /// Format a list of collected tests
    pub fn format_tests(&self, tests: &[TestCase]) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(tests),
            OutputFormat::Csv => tests_csv(tests),
            OutputFormat::Table => self.format_tests_table(tests),
            OutputFormat::Summary => self.format_tests_summary(tests),
        }
    }

    fn format_tests_table(&self, tests: &[TestCase]) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{:<10} {:<12} {}\n",
            "PRIORITY", "CATEGORY", "TEST"
        ));
        output.push_str(&format!("{:-<80}\n", ""));
        for test in tests {
            output.push_str(&format!(
                "{:<10} {:<12} {}\n",
                test.priority.name(),
                test.category,
                test.full_path()
            ));
        }
        output.push_str(&format!("\n{} tests\n", tests.len()));
        output
    }

    fn format_tests_summary(&self, tests: &[TestCase]) -> String {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for test in tests {
            match counts.iter_mut().find(|(c, _)| *c == test.category) {
                Some((_, n)) => *n += 1,
                None => counts.push((test.category.as_str(), 1)),
            }
        }

        let mut output = format!("Collected {} tests\n", tests.len());
        for (category, count) in counts {
            output.push_str(&format!("  {category:<12} {count:>5}\n"));
        }
        output
    }

    /// Format the batch plan of a run
    pub fn format_plan(&self, batches: &[TestBatch]) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                #[derive(Serialize)]
                struct PlanJson<'a> {
                    id: usize,
                    category: &'a str,
                    priority: crate::models::Priority,
                    parallel: bool,
                    timeout: u64,
                    tests: Vec<String>,
                }

                let plan: Vec<PlanJson> = batches
                    .iter()
                    .map(|b| PlanJson {
                        id: b.id,
                        category: &b.category,
                        priority: b.priority,
                        parallel: b.parallel,
                        timeout: b.timeout,
                        tests: b.tests.iter().map(|t| t.full_path()).collect(),
                    })
                    .collect();
                self.to_json(&plan)
            }
            _ => {
                let mut output = String::new();
                output.push_str(&format!(
                    "{:>5}  {:<12} {:<10} {:<10} {:>7} {:>8}\n",
                    "BATCH", "CATEGORY", "PRIORITY", "MODE", "TESTS", "TIMEOUT"
                ));
                output.push_str(&format!("{:-<58}\n", ""));
                for batch in batches {
                    output.push_str(&format!(
                        "{:>5}  {:<12} {:<10} {:<10} {:>7} {:>7}s\n",
                        batch.id,
                        batch.category,
                        batch.priority.name(),
                        batch.mode(),
                        batch.len(),
                        batch.timeout
                    ));
                }
                output
            }
        }
    }

    /// Format the outcome of a run
    pub fn format_run(&self, results: &RunResults) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                #[derive(Serialize)]
                struct RunJson<'a> {
                    summary: &'a crate::models::RunSummary,
                    batches: &'a [crate::models::BatchSummary],
                    failed_tests: &'a [crate::models::FailedTest],
                }

                self.to_json(&RunJson {
                    summary: &results.summary,
                    batches: &results.batches,
                    failed_tests: &results.failed_tests,
                })
            }
            OutputFormat::Csv => tests_csv(&results.tests),
            OutputFormat::Summary => results.summary.to_string(),
            OutputFormat::Table => self.format_run_table(results),
        }
    }

    fn format_run_table(&self, results: &RunResults) -> String {
        let summary = &results.summary;
        let mut output = String::new();

        output.push_str(&format!("\n{:=^70}\n", " Test Execution Summary "));
        output.push_str(&format!(
            "{:>5}  {:<12} {:<10} {:>6} {:>6} {:>6} {:>6} {:>9}\n",
            "BATCH", "CATEGORY", "PRIORITY", "TESTS", "PASS", "FAIL", "T/O", "TIME"
        ));
        output.push_str(&format!("{:-<70}\n", ""));
        for batch in &results.batches {
            output.push_str(&format!(
                "{:>5}  {:<12} {:<10} {:>6} {:>6} {:>6} {:>6} {:>8.1}s\n",
                batch.batch_id,
                batch.category,
                batch.priority.name(),
                batch.total,
                batch.passed,
                batch.failed + batch.errors,
                batch.timeouts,
                batch.wall_time
            ));
        }
        output.push_str(&format!("{:-<70}\n", ""));

        let passed = self.paint(&summary.passed.to_string(), "32");
        let failed = if summary.failed > 0 {
            self.paint(&summary.failed.to_string(), "31")
        } else {
            summary.failed.to_string()
        };
        output.push_str(&format!(
            "Total: {} | Completed: {} | Pass: {} | Fail: {} (errors: {}, timeouts: {})\n",
            summary.total_tests, summary.completed, passed, failed, summary.errors, summary.timeouts
        ));
        output.push_str(&format!(
            "Success Rate: {:.1}% | Duration: {:.2}s\n",
            summary.success_rate, summary.total_duration
        ));

        if !results.failed_tests.is_empty() {
            output.push_str("\nFailures:\n");
            for failure in results.failed_tests.iter().take(MAX_FAILURES_SHOWN) {
                output.push_str(&format!(
                    "  {} {}",
                    self.status_label(failure.status),
                    failure.path
                ));
                if let Some(error) = &failure.error {
                    output.push_str(&format!(" - {error}"));
                }
                output.push('\n');
            }
            if results.failed_tests.len() > MAX_FAILURES_SHOWN {
                output.push_str(&format!(
                    "  ... and {} more\n",
                    results.failed_tests.len() - MAX_FAILURES_SHOWN
                ));
            }
        }

        output.push_str(&format!("{:=<70}\n", ""));
        output
    }

    /// Format stored report listings
    pub fn format_reports(&self, reports: &[ReportInfo]) -> String {
        if reports.is_empty() {
            return "No reports found\n".to_string();
        }

        let mut output = String::new();
        output.push_str(&format!(
            "{:<20} {:>6} {:>6} {:>6} {:>8}  {}\n",
            "TIMESTAMP", "TOTAL", "PASS", "FAIL", "RATE", "FILE"
        ));
        for report in reports {
            let rate = format!("{:.1}%", report.success_rate);
            let rate = if report.failed == 0 {
                self.paint(&rate, "32")
            } else {
                self.paint(&rate, "31")
            };
            output.push_str(&format!(
                "{:<20} {:>6} {:>6} {:>6} {:>8}  {}\n",
                report.timestamp.format("%Y-%m-%d %H:%M:%S"),
                report.total_tests,
                report.passed,
                report.failed,
                rate,
                report.path.display()
            ));
        }
        output
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn tests_csv(tests: &[TestCase]) -> String {
    write_tests_csv(tests).unwrap_or_default()
}

fn write_tests_csv(tests: &[TestCase]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "path", "category", "priority", "status", "duration", "error",
    ])?;
    for test in tests {
        writer.write_record([
            test.full_path(),
            test.category.clone(),
            test.priority.name().to_string(),
            test.status.to_string(),
            format!("{:.3}", test.duration),
            test.error_message.clone().unwrap_or_default(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}
