//! Security module for query validation and SQL injection prevention.

mod identifiers;
mod rules;
mod scanner;
mod statements;
mod validation;

pub use identifiers::{
    normalize_table_name, parse_qualified_name, truncate_for_log, truncate_identifier,
};
pub use rules::{CompiledPattern, KeywordRule, PatternRule, RuleRegistry, RuleSet};
pub use scanner::InjectionScanner;
pub use statements::{check_single_statement, check_statement_type, strip_string_literals};
pub use validation::{validate, QueryValidator, ValidationStage, Verdict};
