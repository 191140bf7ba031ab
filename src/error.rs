//! Error types for the SQL guard.
//!
//! Two families live here:
//! - [`GuardError`]: operational failures (bad configuration, unreadable rule
//!   or schema files, invalid rule patterns). These are returned as `Err`.
//! - [`Violation`]: the reasons a candidate query is rejected. These are
//!   expected outcomes and travel inside a verdict, never as `Err`.

use serde::Serialize;
use thiserror::Error;

/// Operational errors raised while building or configuring the guard.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rule pattern failed to compile
    #[error("Invalid rule pattern '{pattern}': {source}")]
    InvalidRule {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON document could not be decoded
    #[error("Invalid {context} JSON: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Schema snapshot is unusable
    #[error("Schema error: {0}")]
    Schema(String),
}

impl GuardError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a rule compilation error.
    pub fn invalid_rule(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidRule {
            pattern: pattern.into(),
            source,
        }
    }

    /// Create a file read error.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a JSON decoding error.
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check your SQL_GUARD_* environment variables"),
            Self::InvalidRule { .. } => Some("Fix the regular expression in the rule file"),
            Self::Io { .. } => Some("Check that the file exists and is readable"),
            Self::Json { .. } => Some("Validate the file against the documented JSON layout"),
            Self::Schema(_) => Some("Regenerate the schema snapshot from the database"),
        }
    }
}

/// Reason a candidate query was rejected.
///
/// One variant per pipeline gate. The `Display` output is the user-facing
/// message placed in the verdict, so it must stay short and must not echo
/// the raw SQL.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Query exceeds the length limit
    #[error(
        "Query is too long ({length} characters). Maximum allowed is {max_length} characters."
    )]
    QueryTooLong { length: usize, max_length: usize },

    /// Query does not start with SELECT or WITH
    #[error("Only SELECT queries are allowed. The query must start with SELECT or WITH.")]
    NotSelectOrCte,

    /// Query contains a blocked keyword
    #[error(
        "Dangerous keyword '{keyword}' is not allowed. Only read-only SELECT queries are permitted."
    )]
    DangerousKeyword { keyword: String },

    /// Query matches a known injection pattern
    #[error("Potential SQL injection detected: {description}.")]
    InjectionPattern { description: String },

    /// Query contains more than one statement
    #[error("Multiple SQL statements are not allowed. Submit a single SELECT query.")]
    MultipleStatements,

    /// Query references tables missing from the schema
    #[error(
        "{}",
        unknown_tables_message(.tables, .total_unknown, .suggestions, .available, .total_tables)
    )]
    UnknownTables {
        /// Capped list of the missing names
        tables: Vec<String>,
        /// Number of missing names before capping
        total_unknown: usize,
        suggestions: Vec<String>,
        /// Capped preview of known tables, filled only when nothing similar was found.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        available: Vec<String>,
        #[serde(skip)]
        total_tables: usize,
    },
}

impl Violation {
    /// Stable machine-readable code for this violation.
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueryTooLong { .. } => "query_too_long",
            Self::NotSelectOrCte => "not_select_or_cte",
            Self::DangerousKeyword { .. } => "dangerous_keyword",
            Self::InjectionPattern { .. } => "injection_pattern",
            Self::MultipleStatements => "multiple_statements",
            Self::UnknownTables { .. } => "unknown_tables",
        }
    }

    /// Whether this violation came from a security gate (as opposed to the
    /// schema conformance check).
    pub fn is_security(&self) -> bool {
        !matches!(self, Self::UnknownTables { .. })
    }

    /// "Did you mean" suggestions carried by this violation.
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::UnknownTables { suggestions, .. } => suggestions,
            _ => &[],
        }
    }
}

fn unknown_tables_message(
    tables: &[String],
    total_unknown: &usize,
    suggestions: &[String],
    available: &[String],
    total_tables: &usize,
) -> String {
    let mut quoted = tables
        .iter()
        .map(|t| format!("'{}'", t))
        .collect::<Vec<_>>()
        .join(", ");
    if *total_unknown > tables.len() {
        quoted.push_str(&format!(" (and {} more)", total_unknown - tables.len()));
    }
    let mut message = if (*total_unknown).max(tables.len()) == 1 {
        format!("Table {} does not exist.", quoted)
    } else {
        format!("Tables {} do not exist.", quoted)
    };

    if !suggestions.is_empty() {
        message.push_str(&format!(" Did you mean: {}?", suggestions.join(", ")));
    } else if !available.is_empty() {
        message.push_str(&format!(" Available tables: {}", available.join(", ")));
        if *total_tables > available.len() {
            message.push_str(&format!(" (and {} more)", total_tables - available.len()));
        }
        message.push('.');
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_messages() {
        let v = Violation::QueryTooLong {
            length: 10_001,
            max_length: 10_000,
        };
        assert!(v.to_string().contains("10001"));

        let v = Violation::DangerousKeyword {
            keyword: "DROP".to_string(),
        };
        assert!(v.to_string().contains("'DROP'"));
    }

    #[test]
    fn test_unknown_tables_with_suggestions() {
        let v = Violation::UnknownTables {
            tables: vec!["custmers".to_string()],
            total_unknown: 1,
            suggestions: vec!["customers".to_string()],
            available: vec![],
            total_tables: 2,
        };
        assert_eq!(
            v.to_string(),
            "Table 'custmers' does not exist. Did you mean: customers?"
        );
        assert_eq!(v.suggestions(), ["customers".to_string()]);
    }

    #[test]
    fn test_unknown_tables_with_preview() {
        let v = Violation::UnknownTables {
            tables: vec!["zzz".to_string(), "yyy".to_string()],
            total_unknown: 2,
            suggestions: vec![],
            available: vec!["orders".to_string(), "customers".to_string()],
            total_tables: 5,
        };
        assert_eq!(
            v.to_string(),
            "Tables 'zzz', 'yyy' do not exist. Available tables: orders, customers (and 3 more)."
        );
    }

    #[test]
    fn test_unknown_tables_list_is_capped() {
        let v = Violation::UnknownTables {
            tables: vec!["a1".to_string(), "a2".to_string()],
            total_unknown: 40,
            suggestions: vec![],
            available: vec![],
            total_tables: 0,
        };
        assert_eq!(v.to_string(), "Tables 'a1', 'a2' (and 38 more) do not exist.");
    }

    #[test]
    fn test_violation_codes() {
        assert_eq!(Violation::MultipleStatements.code(), "multiple_statements");
        assert!(Violation::NotSelectOrCte.is_security());
        let v = Violation::UnknownTables {
            tables: vec![],
            total_unknown: 0,
            suggestions: vec![],
            available: vec![],
            total_tables: 0,
        };
        assert!(!v.is_security());
    }

    #[test]
    fn test_violation_serialization() {
        let v = Violation::DangerousKeyword {
            keyword: "DELETE".to_string(),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "dangerous_keyword");
        assert_eq!(json["keyword"], "DELETE");
    }

    #[test]
    fn test_error_suggestions() {
        let err = GuardError::config("bad threshold");
        assert!(err.suggestion().is_some());

        let err = GuardError::schema("empty table name");
        assert!(err.to_string().starts_with("Schema error"));
        assert!(err.suggestion().is_some());
    }
}
