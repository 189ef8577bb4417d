//! Batch planning and run orchestration
//!
//! Groups collected tests by category and priority, assigns each group its
//! execution policy and drives the executor over the batches in priority
//! order.

use std::collections::HashMap;
use tracing::info;

use super::parallel::TestExecutor;
use crate::models::{
    BatchSummary, FailedTest, Priority, RunResults, RunSummary, TestBatch, TestCase,
};
use crate::utils::Timer;

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Per-test timeout when a category has no entry of its own
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Categories sharing external state; their tests never run concurrently
const SEQUENTIAL_CATEGORIES: &[&str] = &["database", "integration", "e2e"];

const CATEGORY_TIMEOUTS: &[(&str, u64)] = &[
    ("integration", 60),
    ("e2e", 120),
    ("performance", 90),
    ("agent", 45),
    ("database", 45),
];

pub fn is_parallel_category(category: &str) -> bool {
    !SEQUENTIAL_CATEGORIES.contains(&category)
}

pub fn category_timeout(category: &str) -> u64 {
    CATEGORY_TIMEOUTS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, secs)| *secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Split tests into batches of at most `batch_size`.
///
/// Groups are ordered by ascending priority value; groups with equal
/// priority keep the order in which their first test appeared. Batch ids
/// increase across the whole plan.
pub fn create_batches(tests: Vec<TestCase>, batch_size: usize) -> Vec<TestBatch> {
    let batch_size = batch_size.max(1);

    let mut index: HashMap<(String, Priority), usize> = HashMap::new();
    let mut groups: Vec<(String, Priority, Vec<TestCase>)> = Vec::new();

    for test in tests {
        let key = (test.category.clone(), test.priority);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push((test.category.clone(), test.priority, Vec::new()));
            groups.len() - 1
        });
        groups[slot].2.push(test);
    }

    // Stable sort keeps first-appearance order within a priority
    groups.sort_by_key(|(_, priority, _)| *priority);

    let mut batches = Vec::new();
    let mut next_id = 1;

    for (category, priority, tests) in groups {
        let parallel = is_parallel_category(&category);
        let timeout = category_timeout(&category);
        let mut remaining = tests.into_iter().peekable();

        while remaining.peek().is_some() {
            let chunk: Vec<TestCase> = remaining.by_ref().take(batch_size).collect();
            batches.push(TestBatch {
                id: next_id,
                category: category.clone(),
                priority,
                tests: chunk,
                parallel,
                timeout,
            });
            next_id += 1;
        }
    }

    batches
}

/// Drives the executor over every batch of a run
pub struct BatchProcessor {
    executor: TestExecutor,
    batch_size: usize,
}

impl BatchProcessor {
    pub fn new(executor: TestExecutor) -> Self {
        Self {
            executor,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.executor.max_workers()
    }

    /// Execute all tests batch by batch and aggregate the outcome.
    ///
    /// Batches never overlap; failing tests are recorded, not raised.
    pub async fn process_all(&self, tests: Vec<TestCase>) -> RunResults {
        let total = tests.len();
        let batches = create_batches(tests, self.batch_size);
        let batch_count = batches.len();

        info!(
            "Processing {} tests in {} batches ({} workers)",
            total,
            batch_count,
            self.executor.max_workers()
        );

        let mut results = RunResults::default();
        let mut completed = 0;

        for (position, mut batch) in batches.into_iter().enumerate() {
            info!("[{}/{}] {}", position + 1, batch_count, batch);

            let timer = Timer::start(format!("batch {}", batch.id));
            let tests = std::mem::take(&mut batch.tests);
            let executed = self
                .executor
                .execute_batch(TestBatch { tests, ..batch.clone() })
                .await;
            let summary = BatchSummary::new(&batch, &executed, timer.stop());

            completed += executed.len();
            results
                .failed_tests
                .extend(executed.iter().filter(|t| t.status.is_failure()).map(FailedTest::from));

            info!(
                "Batch {} done: {} passed, {} failed, {} errors, {} timeouts in {:.1}s | Progress: {}/{} ({:.1}%)",
                summary.batch_id,
                summary.passed,
                summary.failed,
                summary.errors,
                summary.timeouts,
                summary.wall_time,
                completed,
                total,
                progress(completed, total)
            );

            results.batches.push(summary);
            results.tests.extend(executed);
        }

        results.summary = RunSummary::from_batches(total, &results.batches);
        info!("{}", results.summary);
        results
    }
}

fn progress(completed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}
