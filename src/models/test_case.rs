//! Test case models for pytest batching
//!
//! Defines discovered test cases, their priority and execution status.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Scheduling urgency of a test category (lower value runs first)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
}

impl Priority {
    pub fn name(&self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Test execution status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Error,
    Timeout,
    Skipped,
    Flaky,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Pending => "·",
            TestStatus::Running => "…",
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Error => "!",
            TestStatus::Timeout => "⏱",
            TestStatus::Skipped => "○",
            TestStatus::Flaky => "~",
        }
    }

    /// Statuses that end up in the failure list of a run
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TestStatus::Failed | TestStatus::Error | TestStatus::Timeout
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TestStatus::Pending | TestStatus::Running)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Pending => "PENDING",
            TestStatus::Running => "RUNNING",
            TestStatus::Passed => "PASSED",
            TestStatus::Failed => "FAILED",
            TestStatus::Error => "ERROR",
            TestStatus::Timeout => "TIMEOUT",
            TestStatus::Skipped => "SKIPPED",
            TestStatus::Flaky => "FLAKY",
        };
        write!(f, "{s}")
    }
}

/// A single independently runnable test discovered by the collector
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub file_path: String,
    pub class_name: Option<String>,
    pub method_name: String,
    pub category: String,
    pub priority: Priority,

    pub status: TestStatus,
    /// Wall-clock seconds
    pub duration: f64,
    pub error_message: Option<String>,
    pub traceback: Option<String>,
    // Never driven by the executor; kept so reports stay schema-compatible.
    pub retries: u32,
    pub flaky: bool,
}

impl TestCase {
    /// Create a pending test case
    pub fn new(
        file_path: impl Into<String>,
        class_name: Option<String>,
        method_name: impl Into<String>,
        category: impl Into<String>,
        priority: Priority,
    ) -> Self {
        let file_path = file_path.into();
        let method_name = method_name.into();
        let stem = Path::new(&file_path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.clone());

        Self {
            id: format!("{stem}::{method_name}"),
            file_path,
            class_name,
            method_name,
            category: category.into(),
            priority,
            status: TestStatus::Pending,
            duration: 0.0,
            error_message: None,
            traceback: None,
            retries: 0,
            flaky: false,
        }
    }

    /// Node id handed to pytest
    pub fn full_path(&self) -> String {
        match &self.class_name {
            Some(class) => format!("{}::{}::{}", self.file_path, class, self.method_name),
            None => format!("{}::{}", self.file_path, self.method_name),
        }
    }

    /// Record a terminal outcome
    pub fn finish(&mut self, status: TestStatus, message: Option<String>) {
        self.status = status;
        if message.is_some() {
            self.error_message = message;
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{:.2}s]",
            self.status.symbol(),
            self.full_path(),
            self.duration
        )?;
        if let Some(msg) = &self.error_message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path_with_class() {
        let case = TestCase::new(
            "tests/test_auth_sample.py",
            Some("TestAuthLogin".to_string()),
            "test_login_success",
            "auth",
            Priority::Critical,
        );
        assert_eq!(
            case.full_path(),
            "tests/test_auth_sample.py::TestAuthLogin::test_login_success"
        );
        assert_eq!(case.id, "test_auth_sample::test_login_success");
        assert_eq!(case.status, TestStatus::Pending);
    }

    #[test]
    fn test_full_path_without_class() {
        let case = TestCase::new("test_utils.py", None, "test_slugify", "unit", Priority::Low);
        assert_eq!(case.full_path(), "test_utils.py::test_slugify");
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::Medium < Priority::Low);
        assert_eq!(Priority::Low as u8, 4);
    }

    #[test]
    fn test_status_classification() {
        assert!(TestStatus::Timeout.is_failure());
        assert!(TestStatus::Error.is_failure());
        assert!(!TestStatus::Passed.is_failure());
        assert!(!TestStatus::Running.is_terminal());
        assert!(TestStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&TestStatus::Timeout).unwrap();
        assert_eq!(json, "\"TIMEOUT\"");
        let json = serde_json::to_string(&Priority::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
    }
}
