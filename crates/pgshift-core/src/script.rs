//! Script format
//!
//! Statements inside a script are delimited by a literal colon. Existing
//! migration files rely on this, so the delimiter must never change.

use crate::naming::{Direction, Migration};

/// Delimiter between statements of one script
pub const STATEMENT_DELIMITER: char = ':';

/// Split a script into the statements to execute, in order
///
/// Chunks without executable content (blank, or only `--` comments) are
/// dropped.
pub fn split_statements(script: &str) -> Vec<&str> {
    script
        .split(STATEMENT_DELIMITER)
        .filter(|chunk| has_content(chunk))
        .collect()
}

fn has_content(chunk: &str) -> bool {
    chunk
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with("--"))
}

/// Placeholder content for a freshly created script
pub fn template(migration: &Migration, direction: Direction) -> String {
    format!("-- Migration {} script for {}.", direction, migration.name)
}
