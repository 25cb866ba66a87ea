//! Read-only SQL validation.
//!
//! Export jobs carry operator-edited SQL; before anything touches the
//! source database the statement is checked to be a pure read. The check is
//! lexical: comments are stripped, whitespace collapsed, and the normalized
//! text must both start with a read keyword and contain no mutating keyword
//! anywhere.

use regex::Regex;
use std::sync::LazyLock;

static COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)--.*?\n|/\*.*?\*/").expect("comment regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("ws regex"));

/// Mutating keywords rejected as whole words (start of statement or
/// preceded by whitespace).
static FORBIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|\s)(?:INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|TRUNCATE|GRANT|REVOKE|MERGE)(?:\s|$|;)",
    )
    .expect("forbidden regex")
});

const READ_PREFIXES: [&str; 5] = ["SELECT", "WITH", "SHOW", "DESCRIBE", "EXPLAIN"];

/// Normalize SQL text for validation: strip comments, collapse whitespace,
/// uppercase.
fn normalize(sql: &str) -> String {
    let stripped = COMMENTS.replace_all(sql, " ");
    WHITESPACE
        .replace_all(&stripped, " ")
        .trim()
        .to_uppercase()
}

/// Check whether `sql` is a read-only statement.
pub fn is_read_only(sql: &str) -> bool {
    let normalized = normalize(sql);

    let starts_with_read = READ_PREFIXES.iter().any(|prefix| {
        normalized
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
    });

    starts_with_read && !FORBIDDEN.is_match(&normalized)
}
