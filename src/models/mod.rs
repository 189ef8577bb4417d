//! Data models for test batching
//!
//! This module contains all data structures shared by collection, execution
//! and reporting.

mod batch;
mod test_case;

pub use batch::{BatchSummary, FailedTest, RunResults, RunSummary, TestBatch};
pub use test_case::{Priority, TestCase, TestStatus};
