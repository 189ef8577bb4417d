//! Single test execution
//!
//! Runs one pytest node id in its own subprocess and turns the outcome into
//! a terminal [`TestStatus`] on the test case.

use regex::Regex;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::PytestConfig;
use crate::models::{TestCase, TestStatus};
use crate::utils::Timer;

/// Lines kept from the first `Traceback` marker onwards
const TRACEBACK_LINES: usize = 10;

const ASSERTION_PATTERN: &str = r"AssertionError: (.+)";
const EXCEPTION_PATTERN: &str = r"(\w+Error): (.+)";

/// Failures of the subprocess itself, as opposed to failing tests
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to launch test process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed waiting for test process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Timeout after {0}s")]
    Timeout(u64),
}

/// Launches pytest for individual tests
#[derive(Clone, Debug)]
pub struct TestRunner {
    pytest: PytestConfig,
    root_dir: PathBuf,
}

impl TestRunner {
    pub fn new(pytest: PytestConfig, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            pytest,
            root_dir: root_dir.into(),
        }
    }

    /// Run one test to a terminal status.
    ///
    /// Never fails: launch problems become `Error`, an expired `timeout_secs`
    /// becomes `Timeout` and the process is killed.
    pub async fn run_test(&self, mut test: TestCase, timeout_secs: u64) -> TestCase {
        test.status = TestStatus::Running;
        let timer = Timer::start(test.full_path());

        let result = self.invoke(&test, timeout_secs).await;
        test.duration = timer.stop();

        match result {
            Ok(output) if output.status.success() => {
                test.finish(TestStatus::Passed, None);
            }
            Ok(output) => {
                test.finish(TestStatus::Failed, None);
                let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                extract_error_info(&mut test, &combined);
                if test.error_message.is_none() {
                    let code = output
                        .status
                        .code()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "none (terminated by signal)".to_string());
                    test.error_message = Some(format!("Exit code {code}"));
                }
            }
            Err(RunError::Timeout(secs)) => {
                test.finish(TestStatus::Timeout, Some(format!("Timeout after {secs}s")));
            }
            Err(e) => {
                let message = e.to_string();
                let error = anyhow::Error::new(e).context(format!("Running {}", test.full_path()));
                test.traceback = Some(format!("{error:?}"));
                test.finish(TestStatus::Error, Some(message));
            }
        }

        debug!("{}", test);
        test
    }

    async fn invoke(&self, test: &TestCase, timeout_secs: u64) -> Result<Output, RunError> {
        let child = self
            .pytest
            .command(&self.root_dir)
            .arg(test.full_path())
            .args(["-v", "--tb=short"])
            .spawn()
            .map_err(RunError::Spawn)?;

        // Dropping the wait future on timeout drops the child, which kills it
        match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
            .await
        {
            Ok(output) => output.map_err(RunError::Wait),
            Err(_) => Err(RunError::Timeout(timeout_secs)),
        }
    }
}

/// Best-effort scrape of pytest output for an error line and a traceback
pub fn extract_error_info(test: &mut TestCase, output: &str) {
    if let Some(message) = first_match(ASSERTION_PATTERN, output)
        .or_else(|| first_match(EXCEPTION_PATTERN, output))
    {
        test.error_message = Some(message);
    }

    if output.contains("Traceback") {
        let lines: Vec<&str> = output.lines().collect();
        if let Some(start) = lines.iter().position(|l| l.contains("Traceback")) {
            let end = (start + TRACEBACK_LINES).min(lines.len());
            test.traceback = Some(lines[start..end].join("\n"));
        }
    }
}

fn first_match(pattern: &str, output: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.find(output).map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use std::path::Path;

    fn case(method: &str) -> TestCase {
        TestCase::new("test_unit_sample.py", None, method, "unit", Priority::Low)
    }

    /// Fake pytest deciding the outcome from the node id
    fn fake_runner(dir: &Path) -> TestRunner {
        let script = dir.join("fake_pytest.sh");
        std::fs::write(
            &script,
            r#"case "$1" in
  *pass*) echo "PASSED"; exit 0 ;;
  *assert*) echo "E       AssertionError: expected 1 == 2"; echo "FAILED"; exit 1 ;;
  *raise*)
    echo "Traceback (most recent call last):"
    for i in 1 2 3 4 5 6 7 8 9 10 11 12; do echo "  frame $i"; done
    echo "E   KeyError: 'user_id'" >&2
    exit 1 ;;
  *silent*) exit 3 ;;
  *hang*) sleep 30; exit 0 ;;
esac
exit 4
"#,
        )
        .unwrap();
        TestRunner::new(
            PytestConfig::new("sh").arg(script.to_string_lossy().to_string()),
            dir,
        )
    }

    #[test]
    fn test_extract_assertion_first() {
        let mut test = case("test_x");
        extract_error_info(
            &mut test,
            "ValueError: bad input\nE   AssertionError: 3 != 4\n",
        );
        assert_eq!(test.error_message.as_deref(), Some("AssertionError: 3 != 4"));
        assert!(test.traceback.is_none());
    }

    #[test]
    fn test_extract_first_exception() {
        let mut test = case("test_x");
        extract_error_info(
            &mut test,
            "E   ConnectionError: refused\nE   TimeoutError: slow\n",
        );
        assert_eq!(test.error_message.as_deref(), Some("ConnectionError: refused"));
    }

    #[test]
    fn test_extract_traceback_window() {
        let mut output = String::from("collected 1 item\nTraceback (most recent call last):\n");
        for i in 0..20 {
            output.push_str(&format!("line {i}\n"));
        }

        let mut test = case("test_x");
        extract_error_info(&mut test, &output);

        let traceback = test.traceback.unwrap();
        let lines: Vec<&str> = traceback.lines().collect();
        assert_eq!(lines.len(), TRACEBACK_LINES);
        assert!(lines[0].starts_with("Traceback"));
        assert_eq!(lines[9], "line 8");
    }

    #[test]
    fn test_extract_nothing() {
        let mut test = case("test_x");
        extract_error_info(&mut test, "1 failed in 0.02s\n");
        assert!(test.error_message.is_none());
        assert!(test.traceback.is_none());
    }

    #[tokio::test]
    async fn test_run_passing_test() {
        let dir = tempfile::tempdir().unwrap();
        let test = fake_runner(dir.path()).run_test(case("test_pass"), 5).await;
        assert_eq!(test.status, TestStatus::Passed);
        assert!(test.error_message.is_none());
        assert!(test.duration > 0.0);
    }

    #[tokio::test]
    async fn test_run_failing_test_extracts_assertion() {
        let dir = tempfile::tempdir().unwrap();
        let test = fake_runner(dir.path()).run_test(case("test_assert"), 5).await;
        assert_eq!(test.status, TestStatus::Failed);
        assert_eq!(
            test.error_message.as_deref(),
            Some("AssertionError: expected 1 == 2")
        );
    }

    #[tokio::test]
    async fn test_run_failing_test_reads_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let test = fake_runner(dir.path()).run_test(case("test_raise"), 5).await;
        assert_eq!(test.status, TestStatus::Failed);
        assert_eq!(test.error_message.as_deref(), Some("KeyError: 'user_id'"));
        assert_eq!(test.traceback.unwrap().lines().count(), TRACEBACK_LINES);
    }

    #[tokio::test]
    async fn test_run_failing_without_message() {
        let dir = tempfile::tempdir().unwrap();
        let test = fake_runner(dir.path()).run_test(case("test_silent"), 5).await;
        assert_eq!(test.status, TestStatus::Failed);
        assert_eq!(test.error_message.as_deref(), Some("Exit code 3"));
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let test = fake_runner(dir.path()).run_test(case("test_hang"), 1).await;
        assert_eq!(test.status, TestStatus::Timeout);
        assert_eq!(test.error_message.as_deref(), Some("Timeout after 1s"));
        assert!(test.duration >= 1.0);
        assert!(test.duration < 10.0);
    }

    #[tokio::test]
    async fn test_run_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("echo_pytest.sh");
        std::fs::write(
            &script,
            r#"echo "E   AssertionError: env=$PYTHONDONTWRITEBYTECODE args=$* cwd=$(pwd -P)"
exit 1
"#,
        )
        .unwrap();
        let runner = TestRunner::new(
            PytestConfig::new("sh").arg(script.to_string_lossy().to_string()),
            dir.path(),
        );
        let before = std::env::var_os("PYTHONDONTWRITEBYTECODE");

        let case = TestCase::new(
            "test_u.py",
            Some("TestCalc".to_string()),
            "test_x",
            "unit",
            Priority::Low,
        );
        let test = runner.run_test(case, 5).await;

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(test.status, TestStatus::Failed);
        assert_eq!(
            test.error_message.unwrap(),
            format!(
                "AssertionError: env=1 args=test_u.py::TestCalc::test_x -v --tb=short cwd={}",
                root.display()
            )
        );
        // Only the child sees the variable
        assert_eq!(std::env::var_os("PYTHONDONTWRITEBYTECODE"), before);
    }

    #[tokio::test]
    async fn test_run_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TestRunner::new(PytestConfig::new("definitely-not-a-real-binary-7f3a"), dir.path());
        let test = runner.run_test(case("test_pass"), 5).await;
        assert_eq!(test.status, TestStatus::Error);
        assert!(test
            .error_message
            .unwrap()
            .starts_with("Failed to launch test process"));
        assert!(test.traceback.is_some());
    }
}
