//! Statement type and statement boundary checks.

use crate::error::Violation;
use once_cell::sync::Lazy;
use regex::Regex;

/// Read-only statement openers. CTEs are SELECTs.
static READ_ONLY_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(SELECT|WITH)\b")
        .unwrap_or_else(|e| panic!("Internal error: invalid statement pattern: {}", e))
});

/// Check that the query starts with `SELECT` or `WITH`.
pub fn check_statement_type(query: &str) -> Result<(), Violation> {
    if READ_ONLY_START.is_match(query) {
        Ok(())
    } else {
        Err(Violation::NotSelectOrCte)
    }
}

/// Check that the query holds exactly one statement.
///
/// Semicolons inside quoted literals and one trailing semicolon are allowed.
pub fn check_single_statement(query: &str) -> Result<(), Violation> {
    let stripped = strip_string_literals(query);
    let trimmed = stripped.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();

    if body.contains(';') {
        Err(Violation::MultipleStatements)
    } else {
        Ok(())
    }
}

/// Replace the contents of quoted literals with nothing, keeping the quotes.
///
/// Handles single-quoted strings and double-quoted identifiers, with doubled
/// quote escapes (`'it''s'`). An unterminated literal is kept verbatim so
/// that anything after the opening quote is still inspected.
pub fn strip_string_literals(query: &str) -> String {
    let mut result = String::with_capacity(query.len());
    let mut chars = query.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        if ch != '\'' && ch != '"' {
            result.push(ch);
            continue;
        }

        let quote = ch;
        let mut closed = false;
        while let Some((_, c)) = chars.next() {
            if c == quote {
                if matches!(chars.peek(), Some((_, next)) if *next == quote) {
                    chars.next();
                    continue;
                }
                closed = true;
                break;
            }
        }

        if closed {
            result.push(quote);
            result.push(quote);
        } else {
            result.push_str(&query[start..]);
            break;
        }
    }

    result
}
