//! Batch and run summary models
//!
//! A batch groups test cases that share a category and priority; summaries
//! aggregate their outcomes per batch and for a whole run.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

use super::test_case::{Priority, TestCase, TestStatus};

/// Unit of scheduling: tests sharing one `(category, priority)`
#[derive(Clone, Debug)]
pub struct TestBatch {
    pub id: usize,
    pub category: String,
    pub priority: Priority,
    pub tests: Vec<TestCase>,
    pub parallel: bool,
    /// Per-test timeout in seconds
    pub timeout: u64,
}

impl TestBatch {
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn mode(&self) -> &'static str {
        if self.parallel {
            "parallel"
        } else {
            "sequential"
        }
    }
}

impl fmt::Display for TestBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch {} [{}/{}] {} tests, {}, timeout {}s",
            self.id,
            self.category,
            self.priority,
            self.tests.len(),
            self.mode(),
            self.timeout
        )
    }
}

/// Outcome counts of one executed batch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: usize,
    pub category: String,
    pub priority: Priority,
    pub parallel: bool,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub timeouts: usize,
    /// Sum of the individual test durations in seconds
    pub duration: f64,
    /// Elapsed seconds for the whole batch
    pub wall_time: f64,
}

impl BatchSummary {
    pub fn new(batch: &TestBatch, executed: &[TestCase], wall_time: f64) -> Self {
        let count = |status: TestStatus| executed.iter().filter(|t| t.status == status).count();

        Self {
            batch_id: batch.id,
            category: batch.category.clone(),
            priority: batch.priority,
            parallel: batch.parallel,
            total: executed.len(),
            passed: count(TestStatus::Passed),
            failed: count(TestStatus::Failed),
            errors: count(TestStatus::Error),
            timeouts: count(TestStatus::Timeout),
            duration: executed.iter().map(|t| t.duration).sum(),
            wall_time,
        }
    }
}

/// Details of a test that did not pass
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailedTest {
    pub path: String,
    pub status: TestStatus,
    pub error: Option<String>,
    pub duration: f64,
    pub category: String,
    pub priority: Priority,
}

impl From<&TestCase> for FailedTest {
    fn from(test: &TestCase) -> Self {
        Self {
            path: test.full_path(),
            status: test.status,
            error: test.error_message.clone(),
            duration: test.duration,
            category: test.category.clone(),
            priority: test.priority,
        }
    }
}

/// Aggregate over every batch of a run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_tests: usize,
    pub completed: usize,
    pub passed: usize,
    /// Every test that did not pass: failed, errored or timed out
    pub failed: usize,
    pub errors: usize,
    pub timeouts: usize,
    pub success_rate: f64,
    pub total_duration: f64,
}

impl RunSummary {
    pub fn from_batches(total_tests: usize, batches: &[BatchSummary]) -> Self {
        let completed = batches.iter().map(|b| b.total).sum();
        let passed = batches.iter().map(|b| b.passed).sum();
        let errors = batches.iter().map(|b| b.errors).sum();
        let timeouts = batches.iter().map(|b| b.timeouts).sum();
        let failed = batches.iter().map(|b| b.failed).sum::<usize>() + errors + timeouts;

        Self {
            total_tests,
            completed,
            passed,
            failed,
            errors,
            timeouts,
            success_rate: success_rate(passed, completed),
            total_duration: batches.iter().map(|b| b.duration).sum(),
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total: {} | Completed: {} | Pass: {} | Fail: {} (errors: {}, timeouts: {})",
            self.total_tests, self.completed, self.passed, self.failed, self.errors, self.timeouts
        )?;
        write!(
            f,
            "Success Rate: {:.1}% | Duration: {:.2}s",
            self.success_rate, self.total_duration
        )
    }
}

/// Percentage of completed tests that passed; 0 when nothing completed
pub fn success_rate(passed: usize, completed: usize) -> f64 {
    if completed == 0 {
        0.0
    } else {
        (passed as f64 / completed as f64) * 100.0
    }
}

/// Everything produced by processing all batches
#[derive(Clone, Debug, Default)]
pub struct RunResults {
    pub batches: Vec<BatchSummary>,
    pub summary: RunSummary,
    pub failed_tests: Vec<FailedTest>,
    pub tests: Vec<TestCase>,
}
