//! Batch execution
//!
//! Runs the tests of one batch either one after another or concurrently on a
//! bounded pool, one subprocess per test.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::runner::TestRunner;
use crate::models::{TestBatch, TestCase, TestStatus};
use crate::utils::Timer;

/// Extra seconds the coordinator waits beyond the per-test timeout
pub const OUTER_TIMEOUT_GRACE_SECS: u64 = 5;

/// Executes batches of tests
pub struct TestExecutor {
    runner: Arc<TestRunner>,
    max_workers: usize,
}

impl TestExecutor {
    pub fn new(runner: TestRunner, max_workers: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every test in the batch to a terminal status.
    ///
    /// The returned tests are in the batch's original order.
    pub async fn execute_batch(&self, batch: TestBatch) -> Vec<TestCase> {
        if batch.parallel && batch.tests.len() > 1 {
            self.execute_parallel(batch.tests, batch.timeout).await
        } else {
            self.execute_sequential(batch.tests, batch.timeout).await
        }
    }

    async fn execute_sequential(&self, tests: Vec<TestCase>, timeout_secs: u64) -> Vec<TestCase> {
        let mut results = Vec::with_capacity(tests.len());
        for test in tests {
            results.push(self.runner.run_test(test, timeout_secs).await);
        }
        results
    }

    async fn execute_parallel(&self, tests: Vec<TestCase>, timeout_secs: u64) -> Vec<TestCase> {
        let workers = self.max_workers.min(tests.len());
        let semaphore = Arc::new(Semaphore::new(workers));
        debug!("Running {} tests on {} workers", tests.len(), workers);

        let handles: Vec<(TestCase, JoinHandle<TestCase>)> = tests
            .into_iter()
            .map(|test| {
                let pending = test.clone();
                let runner = self.runner.clone();
                let semaphore = semaphore.clone();

                let handle = tokio::spawn(async move {
                    // The semaphore is never closed, so a permit always arrives
                    let _permit = semaphore.acquire_owned().await.ok();
                    runner.run_test(test, timeout_secs).await
                });

                (pending, handle)
            })
            .collect();

        let outer = Duration::from_secs(timeout_secs + OUTER_TIMEOUT_GRACE_SECS);
        collect_in_order(handles, outer, timeout_secs).await
    }
}

/// Await worker handles in submission order so results keep the batch order.
///
/// The runner enforces `timeout_secs` itself; `outer` only fires when a
/// worker stalls outside the subprocess wait. Such a worker is aborted and
/// its test recorded as `Timeout`, a panicked worker as `Error`.
async fn collect_in_order(
    handles: Vec<(TestCase, JoinHandle<TestCase>)>,
    outer: Duration,
    timeout_secs: u64,
) -> Vec<TestCase> {
    let mut results = Vec::with_capacity(handles.len());

    for (mut pending, mut handle) in handles {
        let waited = Timer::start(pending.full_path());

        match tokio::time::timeout(outer, &mut handle).await {
            Ok(Ok(test)) => results.push(test),
            Ok(Err(join_error)) => {
                warn!("Worker for {} failed: {}", pending.full_path(), join_error);
                pending.duration = waited.elapsed_secs();
                pending.traceback = Some(format!("{join_error:?}"));
                pending.finish(TestStatus::Error, Some(join_error.to_string()));
                results.push(pending);
            }
            Err(_) => {
                // Aborting drops the running test future and kills its process
                handle.abort();
                warn!(
                    "{} exceeded batch timeout of {}s",
                    pending.full_path(),
                    timeout_secs
                );
                pending.duration = waited.elapsed_secs();
                pending.finish(
                    TestStatus::Timeout,
                    Some(format!(
                        "Exceeded batch timeout of {timeout_secs}s (+{OUTER_TIMEOUT_GRACE_SECS}s grace)"
                    )),
                );
                results.push(pending);
            }
        }
    }

    results
}
