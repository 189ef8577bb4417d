//! Test execution engine
//!
//! Plans batches and runs them sequentially or on a bounded worker pool.

mod batch;
mod parallel;
mod runner;

pub use batch::{create_batches, BatchProcessor};
pub use parallel::TestExecutor;
pub use runner::TestRunner;
