//! Run reports
//!
//! Writes the JSON and Markdown reports of a run and reads them back.

mod report;
mod storage;

pub use report::{
    interpreter_version, markdown_summary, ReportGenerator, ReportMetadata, TestReport,
};
pub use storage::{export_failures, ExportFormat, ReportInfo, ReportStore};
