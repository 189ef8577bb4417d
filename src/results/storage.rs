//! Stored report retrieval
//!
//! Reads the JSON reports left in a report directory by earlier runs and
//! exports their failing tests.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::report::{TestReport, REPORT_PREFIX};

/// Brief report information
#[derive(Clone, Debug)]
pub struct ReportInfo {
    pub path: PathBuf,
    pub timestamp: DateTime<Local>,
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub success_rate: f64,
}

/// Report directory reader
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// JSON report files, newest first
    fn report_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?
        {
            let path = entry?.path();
            let is_report = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(REPORT_PREFIX) && n.ends_with(".json"))
                .unwrap_or(false);
            if is_report {
                files.push(path);
            }
        }

        // File names embed a sortable timestamp
        files.sort_by(|a, b| b.cmp(a));
        Ok(files)
    }

    /// All readable reports, newest first; unreadable files are skipped
    pub fn list(&self) -> Result<Vec<ReportInfo>> {
        let mut reports = Vec::new();
        for path in self.report_files()? {
            match load(&path) {
                Ok(report) => reports.push(ReportInfo {
                    timestamp: report.metadata.timestamp,
                    total_tests: report.summary.total_tests,
                    passed: report.summary.passed,
                    failed: report.summary.failed,
                    success_rate: report.summary.success_rate,
                    path,
                }),
                Err(e) => debug!("Failed to load {}: {:#}", path.display(), e),
            }
        }
        Ok(reports)
    }

    /// Most recent readable report
    pub fn latest(&self) -> Result<Option<(PathBuf, TestReport)>> {
        for path in self.report_files()? {
            match load(&path) {
                Ok(report) => return Ok(Some((path, report))),
                Err(e) => debug!("Failed to load {}: {:#}", path.display(), e),
            }
        }
        Ok(None)
    }
}

/// Load one report file
pub fn load(path: &Path) -> Result<TestReport> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Export the failing tests of a report
pub fn export_failures(report: &TestReport, path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Json => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &report.failed_tests)?;
        }
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_path(path)?;
            writer.write_record(["path", "status", "category", "priority", "duration", "error"])?;

            for failure in &report.failed_tests {
                writer.write_record([
                    failure.path.clone(),
                    failure.status.to_string(),
                    failure.category.clone(),
                    failure.priority.to_string(),
                    format!("{:.3}", failure.duration),
                    failure.error.clone().unwrap_or_default(),
                ])?;
            }
            writer.flush()?;
        }
    }

    info!(
        "Exported {} failed tests to {}",
        report.failed_tests.len(),
        path.display()
    );
    Ok(())
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}
