//! Query validation pipeline.
//!
//! A candidate query passes through a fixed sequence of gates:
//!
//! 1. length
//! 2. statement type (`SELECT` / `WITH` only)
//! 3. dangerous keywords
//! 4. injection patterns
//! 5. statement count
//! 6. schema conformance (skipped without a schema)
//!
//! The first failing gate decides the verdict and no later gate runs.
//! Gates 1-5 never depend on the schema.

use crate::config::ValidationConfig;
use crate::constants::{MAX_ECHOED_IDENTIFIER_LENGTH, MAX_ECHOED_TABLES};
use crate::error::Violation;
use crate::schema::{extract_table_references, FuzzyMatcher, SchemaModel};
use crate::security::identifiers::{normalize_table_name, truncate_identifier};
use crate::security::rules::RuleRegistry;
use crate::security::scanner::InjectionScanner;
use crate::security::statements::{check_single_statement, check_statement_type};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Pipeline gate, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    Length,
    StatementType,
    Keywords,
    Patterns,
    StatementCount,
    Schema,
}

impl ValidationStage {
    /// All gates in evaluation order.
    pub const ALL: [ValidationStage; 6] = [
        ValidationStage::Length,
        ValidationStage::StatementType,
        ValidationStage::Keywords,
        ValidationStage::Patterns,
        ValidationStage::StatementCount,
        ValidationStage::Schema,
    ];

    /// The gate that produces a given violation.
    pub fn of(violation: &Violation) -> Self {
        match violation {
            Violation::QueryTooLong { .. } => Self::Length,
            Violation::NotSelectOrCte => Self::StatementType,
            Violation::DangerousKeyword { .. } => Self::Keywords,
            Violation::InjectionPattern { .. } => Self::Patterns,
            Violation::MultipleStatements => Self::StatementCount,
            Violation::UnknownTables { .. } => Self::Schema,
        }
    }
}

/// Outcome of validating one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Whether the query may be executed
    pub is_valid: bool,
    /// Display-ready explanation; empty when valid
    pub message: String,
    /// Suggested table names, if any
    pub suggestions: Vec<String>,
    /// Structured reason for rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<Violation>,
}

impl Verdict {
    /// A passing verdict.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: String::new(),
            suggestions: Vec::new(),
            violation: None,
        }
    }

    /// A rejecting verdict.
    pub fn invalid(violation: Violation) -> Self {
        Self {
            is_valid: false,
            message: violation.to_string(),
            suggestions: violation.suggestions().to_vec(),
            violation: Some(violation),
        }
    }

    /// The gate that rejected the query, if any.
    pub fn stage(&self) -> Option<ValidationStage> {
        self.violation.as_ref().map(ValidationStage::of)
    }
}

impl From<Result<(), Violation>> for Verdict {
    fn from(result: Result<(), Violation>) -> Self {
        match result {
            Ok(()) => Verdict::valid(),
            Err(violation) => Verdict::invalid(violation),
        }
    }
}

/// Query validator.
///
/// Holds no mutable state; one instance can serve any number of threads.
#[derive(Debug, Clone)]
pub struct QueryValidator {
    max_length: usize,
    table_preview: usize,
    scanner: InjectionScanner,
    matcher: FuzzyMatcher,
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default(), RuleRegistry::builtin())
    }
}

static DEFAULT_VALIDATOR: Lazy<QueryValidator> = Lazy::new(QueryValidator::default);

/// Validate a query with the default settings and built-in rules.
pub fn validate(sql: &str, schema: Option<&dyn SchemaModel>) -> Verdict {
    DEFAULT_VALIDATOR.validate(sql, schema)
}

impl QueryValidator {
    /// Create a new query validator.
    pub fn new(config: &ValidationConfig, rules: Arc<RuleRegistry>) -> Self {
        Self {
            max_length: config.max_query_length,
            table_preview: config.table_preview,
            scanner: InjectionScanner::new(rules),
            matcher: FuzzyMatcher::new(
                config.likely_match_threshold,
                config.suggestion_threshold,
                config.max_suggestions,
            ),
        }
    }

    /// Validate a query, returning a verdict.
    pub fn validate(&self, sql: &str, schema: Option<&dyn SchemaModel>) -> Verdict {
        let result = self.check(sql, schema);
        if let Err(violation) = &result {
            debug!(
                stage = ?ValidationStage::of(violation),
                "Query rejected: {}",
                violation.code()
            );
        }
        Verdict::from(result)
    }

    /// Run every gate in order, stopping at the first violation.
    pub fn check(&self, sql: &str, schema: Option<&dyn SchemaModel>) -> Result<(), Violation> {
        self.check_length(sql)?;
        check_statement_type(sql)?;
        self.scanner.check_keywords(sql)?;
        self.scanner.check_patterns(sql)?;
        check_single_statement(sql)?;
        self.check_schema(sql, schema)
    }

    /// Run only the security gates (everything except schema conformance).
    pub fn check_security(&self, sql: &str) -> Result<(), Violation> {
        self.check(sql, None)
    }

    fn check_length(&self, sql: &str) -> Result<(), Violation> {
        // Cheap byte-length shortcut: a string never has more chars than bytes
        if sql.len() <= self.max_length {
            return Ok(());
        }
        let length = sql.chars().count();
        if length > self.max_length {
            Err(Violation::QueryTooLong {
                length,
                max_length: self.max_length,
            })
        } else {
            Ok(())
        }
    }

    /// Check that every referenced table exists in the schema.
    fn check_schema(&self, sql: &str, schema: Option<&dyn SchemaModel>) -> Result<(), Violation> {
        let Some(schema) = schema else {
            debug!("No schema snapshot, skipping schema conformance check");
            return Ok(());
        };

        let known: BTreeSet<String> = schema
            .known_tables()
            .iter()
            .map(|t| normalize_table_name(t))
            .filter(|t| !t.is_empty())
            .collect();
        if known.is_empty() {
            debug!("Empty schema snapshot, skipping schema conformance check");
            return Ok(());
        }

        let refs = extract_table_references(sql);
        let unknown: Vec<&String> = refs
            .external_tables()
            .filter(|t| !known.contains(*t))
            .collect();
        if unknown.is_empty() {
            return Ok(());
        }

        let known: Vec<String> = known.into_iter().collect();
        let mut suggestions: Vec<String> = Vec::new();
        for name in &unknown {
            if suggestions.len() >= self.matcher.max_suggestions() {
                break;
            }
            for candidate in self.matcher.suggest(name, &known) {
                if !suggestions.contains(&candidate) {
                    suggestions.push(candidate);
                }
            }
        }
        suggestions.truncate(self.matcher.max_suggestions());

        let available = if suggestions.is_empty() {
            known.iter().take(self.table_preview).cloned().collect()
        } else {
            Vec::new()
        };

        Err(Violation::UnknownTables {
            tables: unknown
                .iter()
                .take(MAX_ECHOED_TABLES)
                .map(|t| truncate_identifier(t, MAX_ECHOED_IDENTIFIER_LENGTH))
                .collect(),
            total_unknown: unknown.len(),
            suggestions,
            available,
            total_tables: known.len(),
        })
    }
}
