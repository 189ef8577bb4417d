//! Test discovery
//!
//! Finds `test_*.py` files under the configured roots and asks pytest to
//! list the tests in each one without running them. Collection is
//! best-effort per file: a file whose collection fails contributes no tests
//! and the run carries on.

pub mod categorizer;

pub use categorizer::categorize;

use ignore::WalkBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PytestConfig;
use crate::models::TestCase;

/// Verbose collect-only format: `<Module m>::<Class C>::<Function f>`
const MODULE_PATTERN: &str = r"<Module [^>]+>::(?:<Class ([^>]+)>::)?<Function ([^>]+)>";

/// Quiet collect-only format: `path/test_x.py::Class::test_y`
///
/// Parametrized ids may contain spaces, so the function takes the rest of
/// the line.
const NODE_ID_PATTERN: &str = r"(?m)^\S+?\.py::(?:([A-Za-z_]\w*)::)?(.+?)\s*$";

/// Errors from collecting a single file
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Failed to launch collector: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed waiting for collector: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Collection timed out after {0}s")]
    Timeout(u64),

    #[error("Collector exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

/// One test reported by the collector
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectedItem {
    pub class_name: Option<String>,
    pub function: String,
}

/// Discovers pytest tests without executing them
pub struct TestCollector {
    pytest: PytestConfig,
    root_dir: PathBuf,
    timeout_secs: u64,
    tests: Vec<TestCase>,
}

impl TestCollector {
    pub fn new(pytest: PytestConfig, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            pytest,
            root_dir: root_dir.into(),
            timeout_secs: 10,
            tests: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn into_tests(self) -> Vec<TestCase> {
        self.tests
    }

    /// Collect tests from root-relative files or directories
    pub async fn collect_tests<S: AsRef<str>>(&mut self, paths: &[S]) -> &[TestCase] {
        for path in paths {
            let path = path.as_ref();
            let target = self.resolve(path);

            if target.is_file() {
                self.collect_file(&target).await;
            } else if target.is_dir() {
                let files = find_test_files(&target);
                debug!("Found {} test files under {}", files.len(), path);
                for file in files {
                    self.collect_file(&file).await;
                }
            } else {
                warn!("Test path not found: {}", target.display());
            }
        }

        info!("Collected {} tests", self.tests.len());
        &self.tests
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if path.is_empty() || path == "." {
            self.root_dir.clone()
        } else {
            self.root_dir.join(path)
        }
    }

    /// Path as pytest sees it from the root directory
    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }

    async fn collect_file(&mut self, file: &Path) {
        let file_path = self.relative(file);

        match self.run_collector(&file_path).await {
            Ok(stdout) => {
                let items = parse_collect_output(&stdout);
                debug!("{}: {} tests", file_path, items.len());

                for item in items {
                    let (category, priority) = categorize(&file_path, &item.function);
                    self.tests.push(TestCase::new(
                        file_path.as_str(),
                        item.class_name,
                        item.function,
                        category,
                        priority,
                    ));
                }
            }
            Err(e) => warn!("Skipping {}: {}", file_path, e),
        }
    }

    async fn run_collector(&self, file_path: &str) -> Result<String, CollectError> {
        let child = self
            .pytest
            .command(&self.root_dir)
            .args(["--collect-only", "-q", file_path])
            .spawn()
            .map_err(CollectError::Spawn)?;

        let output = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| CollectError::Timeout(self.timeout_secs))?
        .map_err(CollectError::Wait)?;

        if !output.status.success() {
            return Err(CollectError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Recursively find `test_*.py` files, sorted for a stable order
pub fn find_test_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkBuilder::new(dir)
        .hidden(true)
        .git_ignore(true)
        .build()
        .flatten()
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && is_test_file(path))
        .collect();

    files.sort();
    files
}

fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("test_") && n.ends_with(".py"))
        .unwrap_or(false)
}

/// Parse `--collect-only` output into test items.
///
/// The `<Module ...>` form is tried first; when it yields nothing the quiet
/// node-id form is used. Unrecognized output yields no items.
pub fn parse_collect_output(output: &str) -> Vec<CollectedItem> {
    let items = capture_items(MODULE_PATTERN, output);
    if !items.is_empty() {
        return items;
    }
    capture_items(NODE_ID_PATTERN, output)
}

fn capture_items(pattern: &str, output: &str) -> Vec<CollectedItem> {
    let re = match Regex::new(pattern) {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };

    re.captures_iter(output)
        .filter_map(|cap| {
            let function = cap.get(2)?.as_str().to_string();
            Some(CollectedItem {
                class_name: cap.get(1).map(|m| m.as_str().to_string()),
                function,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TestStatus};

    fn scratch_dir() -> tempfile::TempDir {
        tempfile::Builder::new().prefix("suite").tempdir().unwrap()
    }

    /// Fake collector printing node ids for every `def test_` in the file
    fn fake_collector(dir: &Path) -> PytestConfig {
        let script = dir.join("fake_collect.sh");
        std::fs::write(
            &script,
            r#"# args: --collect-only -q <file>
file="$3"
case "$file" in
  *broken*) echo "ERROR collecting $file" >&2; exit 2 ;;
esac
class=""
while IFS= read -r line; do
  case "$line" in
    class\ *) class=$(echo "$line" | sed -e 's/^class \([A-Za-z0-9_]*\).*/\1/') ;;
    *def\ test_*)
      name=$(echo "$line" | sed -e 's/.*def \(test_[A-Za-z0-9_]*\).*/\1/')
      case "$line" in
        \ *) echo "$file::$class::$name" ;;
        *) echo "$file::$name" ;;
      esac ;;
  esac
done < "$file"
echo ""
echo "1 test collected in 0.01s"
"#,
        )
        .unwrap();
        PytestConfig::new("sh").arg(script.to_string_lossy().to_string())
    }

    #[test]
    fn test_parse_module_format() {
        let output = "<Module test_auth_sample.py>::<Class TestAuthLogin>::<Function test_login_success>\n\
                      <Module test_auth_sample.py>::<Function test_logout>\n";
        let items = parse_collect_output(output);
        assert_eq!(
            items,
            vec![
                CollectedItem {
                    class_name: Some("TestAuthLogin".to_string()),
                    function: "test_login_success".to_string(),
                },
                CollectedItem {
                    class_name: None,
                    function: "test_logout".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_node_id_format() {
        let output = "tests/test_api.py::TestUsers::test_list\n\
                      tests/test_api.py::test_health[v1-200]\n\
                      \n\
                      2 tests collected in 0.03s\n";
        let items = parse_collect_output(output);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].class_name.as_deref(), Some("TestUsers"));
        assert_eq!(items[0].function, "test_list");
        assert_eq!(items[1].class_name, None);
        assert_eq!(items[1].function, "test_health[v1-200]");
    }

    #[test]
    fn test_parse_parametrized_ids_with_spaces() {
        let output = "tests/test_api.py::test_greet[hello world]\n\
                      tests/test_api.py::TestUsers::test_name[ Ada  Lovelace ]\n\
                      tests/test_api.py::test_plain\n\
                      \n\
                      3 tests collected in 0.02s\n";
        let items = parse_collect_output(output);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].class_name, None);
        assert_eq!(items[0].function, "test_greet[hello world]");
        assert_eq!(items[1].class_name.as_deref(), Some("TestUsers"));
        assert_eq!(items[1].function, "test_name[ Ada  Lovelace ]");
        assert_eq!(items[2].function, "test_plain");
    }

    #[test]
    fn test_wait_error_message() {
        let error = CollectError::Wait(std::io::Error::other("pipe closed"));
        assert!(error.to_string().starts_with("Failed waiting for collector"));
    }

    #[test]
    fn test_parse_unrecognized_output() {
        assert!(parse_collect_output("no tests ran in 0.01s\n").is_empty());
        assert!(parse_collect_output("").is_empty());
    }

    #[test]
    fn test_find_test_files() {
        let dir = scratch_dir();
        let nested = dir.path().join("api");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("test_one.py"), "").unwrap();
        std::fs::write(nested.join("test_two.py"), "").unwrap();
        std::fs::write(nested.join("helpers.py"), "").unwrap();
        std::fs::write(nested.join("conftest.py"), "").unwrap();

        let files = find_test_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| is_test_file(f)));
    }

    #[tokio::test]
    async fn test_collect_auth_sample_directory() {
        let dir = scratch_dir();
        std::fs::write(
            dir.path().join("test_auth_sample.py"),
            "class TestAuthLogin:\n    def test_login_success(self):\n        assert True\n",
        )
        .unwrap();

        let mut collector = TestCollector::new(fake_collector(dir.path()), dir.path());
        let tests = collector.collect_tests(&["."]).await;

        assert_eq!(tests.len(), 1);
        let case = &tests[0];
        assert_eq!(case.category, "auth");
        assert_eq!(case.priority, Priority::Critical);
        assert_eq!(case.status, TestStatus::Pending);
        assert_eq!(
            case.full_path(),
            "test_auth_sample.py::TestAuthLogin::test_login_success"
        );
    }

    #[tokio::test]
    async fn test_collect_skips_failing_files() {
        let dir = scratch_dir();
        std::fs::write(dir.path().join("test_broken_import.py"), "def test_x():\n    pass\n")
            .unwrap();
        std::fs::write(
            dir.path().join("test_utils.py"),
            "def test_slugify():\n    pass\n\ndef test_strip():\n    pass\n",
        )
        .unwrap();

        let mut collector = TestCollector::new(fake_collector(dir.path()), dir.path());
        collector.collect_tests(&["."]).await;

        let tests = collector.into_tests();
        assert_eq!(tests.len(), 2);
        assert!(tests.iter().all(|t| t.file_path == "test_utils.py"));
        assert!(tests.iter().all(|t| t.category == "unit"));
    }

    #[tokio::test]
    async fn test_collect_missing_path_and_spawn_failure() {
        let dir = scratch_dir();
        std::fs::write(dir.path().join("test_api.py"), "def test_get():\n    pass\n").unwrap();

        let mut collector = TestCollector::new(
            PytestConfig::new("definitely-not-a-real-binary-7f3a"),
            dir.path(),
        );
        let tests = collector.collect_tests(&["missing", "test_api.py"]).await;
        assert!(tests.is_empty());
    }

    #[tokio::test]
    async fn test_collect_timeout() {
        let dir = scratch_dir();
        std::fs::write(dir.path().join("test_slow.py"), "def test_x():\n    pass\n").unwrap();
        let script = dir.path().join("hang.sh");
        std::fs::write(&script, "sleep 30\n").unwrap();

        let mut collector = TestCollector::new(
            PytestConfig::new("sh").arg(script.to_string_lossy().to_string()),
            dir.path(),
        )
        .with_timeout(1);

        let started = std::time::Instant::now();
        let tests = collector.collect_tests(&["test_slow.py"]).await;
        assert!(tests.is_empty());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
