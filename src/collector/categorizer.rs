//! Path based test categorization
//!
//! Maps a test location to a `(category, priority)` pair by ordered
//! first-match over substring patterns.

use crate::models::Priority;

/// Category assigned when nothing matches
pub const OTHER_CATEGORY: &str = "other";

/// Category table, matched in declaration order.
///
/// A location containing patterns of several categories resolves to the
/// earliest entry, so `test_auth_database_sync.py` is an auth test.
const CATEGORY_PATTERNS: &[(&str, &[&str])] = &[
    ("auth", &["auth", "login", "jwt", "oauth", "token", "permission"]),
    (
        "database",
        &["database", "clickhouse", "postgres", "redis", "sql", "migration", "db_"],
    ),
    ("api", &["api", "endpoint", "route", "http"]),
    ("websocket", &["websocket", "socket", "ws_"]),
    ("agent", &["agent", "llm", "supervisor", "prompt"]),
    ("service", &["service", "manager", "client"]),
    ("integration", &["integration", "e2e", "end_to_end"]),
    ("unit", &["unit", "util", "helper", "model"]),
    ("performance", &["performance", "perf_", "benchmark", "stress", "load_test"]),
    ("config", &["config", "settings", "environment"]),
];

/// Fixed priority of a category; unknown categories are MEDIUM
pub fn category_priority(category: &str) -> Priority {
    match category {
        "auth" | "database" => Priority::Critical,
        "api" | "websocket" | "agent" => Priority::High,
        "unit" | "performance" => Priority::Low,
        _ => Priority::Medium,
    }
}

/// Categorize a test from its path and (possibly empty) name
pub fn categorize(test_path: &str, test_name: &str) -> (&'static str, Priority) {
    let haystack = format!("{test_path} {test_name}").to_lowercase();

    CATEGORY_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| haystack.contains(p)))
        .map(|(category, _)| (*category, category_priority(category)))
        .unwrap_or((OTHER_CATEGORY, Priority::Medium))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        assert_eq!(
            categorize("tests/test_auth_database_sync.py", ""),
            ("auth", Priority::Critical)
        );
        assert_eq!(
            categorize("tests/test_clickhouse_api.py", ""),
            ("database", Priority::Critical)
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            categorize("tests/Test_WebSocket_Events.py", ""),
            ("websocket", Priority::High)
        );
    }

    #[test]
    fn test_name_participates() {
        assert_eq!(
            categorize("tests/test_misc.py", "test_agent_handoff"),
            ("agent", Priority::High)
        );
    }

    #[test]
    fn test_no_match_is_other() {
        assert_eq!(
            categorize("tests/test_misc.py", "test_something"),
            (OTHER_CATEGORY, Priority::Medium)
        );
        assert_eq!(categorize("", ""), (OTHER_CATEGORY, Priority::Medium));
    }

    #[test]
    fn test_priority_table() {
        assert_eq!(category_priority("auth"), Priority::Critical);
        assert_eq!(category_priority("database"), Priority::Critical);
        assert_eq!(category_priority("api"), Priority::High);
        assert_eq!(category_priority("service"), Priority::Medium);
        assert_eq!(category_priority("integration"), Priority::Medium);
        assert_eq!(category_priority("config"), Priority::Medium);
        assert_eq!(category_priority("unit"), Priority::Low);
        assert_eq!(category_priority("performance"), Priority::Low);
    }

    #[test]
    fn test_table_order() {
        let order: Vec<_> = CATEGORY_PATTERNS.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            order,
            vec![
                "auth",
                "database",
                "api",
                "websocket",
                "agent",
                "service",
                "integration",
                "unit",
                "performance",
                "config"
            ]
        );
    }

    #[test]
    fn test_deterministic() {
        let inputs = [
            ("tests/test_user_service.py", "test_create"),
            ("tests/integration/test_flow.py", ""),
            ("tests/test_settings.py", "test_defaults"),
        ];
        for (path, name) in inputs {
            let first = categorize(path, name);
            for _ in 0..10 {
                assert_eq!(categorize(path, name), first);
            }
        }
    }
}
