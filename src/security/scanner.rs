//! Keyword and injection pattern scanning.
//!
//! Both scans are stateless text checks against a [`RuleRegistry`]. They run
//! on the raw query text, including string literals, so a dangerous keyword
//! hidden inside a quoted value still rejects the query.

use crate::error::Violation;
use crate::security::rules::RuleRegistry;
use std::sync::Arc;
use tracing::debug;

/// Scans query text against the dangerous keyword and injection tables.
#[derive(Debug, Clone)]
pub struct InjectionScanner {
    rules: Arc<RuleRegistry>,
}

impl Default for InjectionScanner {
    fn default() -> Self {
        Self::new(RuleRegistry::builtin())
    }
}

impl InjectionScanner {
    /// Create a scanner over a compiled registry.
    pub fn new(rules: Arc<RuleRegistry>) -> Self {
        Self { rules }
    }

    /// Check for dangerous keywords.
    ///
    /// Returns the first keyword, in table order, that occurs as a whole word.
    pub fn check_keywords(&self, query: &str) -> Result<(), Violation> {
        match self.rules.keywords().iter().find(|rule| rule.is_match(query)) {
            Some(rule) => Err(Violation::DangerousKeyword {
                keyword: rule.keyword.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Check for injection patterns.
    ///
    /// Returns the first pattern, in table order, that matches.
    pub fn check_patterns(&self, query: &str) -> Result<(), Violation> {
        match self.rules.patterns().iter().find(|rule| rule.is_match(query)) {
            Some(rule) => {
                debug!(pattern = rule.pattern(), "Injection pattern matched");
                Err(Violation::InjectionPattern {
                    description: rule.description.clone(),
                })
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> InjectionScanner {
        InjectionScanner::default()
    }

    fn keyword_of(query: &str) -> Option<String> {
        match scanner().check_keywords(query) {
            Err(Violation::DangerousKeyword { keyword }) => Some(keyword),
            _ => None,
        }
    }

    fn pattern_of(query: &str) -> Option<String> {
        match scanner().check_patterns(query) {
            Err(Violation::InjectionPattern { description }) => Some(description),
            _ => None,
        }
    }

    #[test]
    fn test_clean_query() {
        let s = scanner();
        assert!(s.check_keywords("SELECT name, email FROM users").is_ok());
        assert!(s.check_patterns("SELECT name, email FROM users").is_ok());
        assert!(s
            .check_keywords("SELECT created_at, last_updated FROM orders")
            .is_ok());
    }

    #[test]
    fn test_keywords_any_case() {
        assert_eq!(keyword_of("select * from t; drop table t").as_deref(), Some("DROP"));
        assert_eq!(keyword_of("SELECT 1 FROM t WHERE x IN (DeLeTe)").as_deref(), Some("DELETE"));
        assert_eq!(keyword_of("SELECT * FROM t; GRANT ALL ON t TO bob").as_deref(), Some("GRANT"));
        assert_eq!(keyword_of("COPY t TO '/tmp/x'").as_deref(), Some("COPY"));
    }

    #[test]
    fn test_keyword_inside_literal_still_rejected() {
        assert_eq!(
            keyword_of("SELECT * FROM audit WHERE action = 'delete'").as_deref(),
            Some("DELETE")
        );
    }

    #[test]
    fn test_keyword_as_identifier_rejected() {
        // Column literally named "update"
        assert_eq!(keyword_of("SELECT t.update FROM t").as_deref(), Some("UPDATE"));
    }

    #[test]
    fn test_first_keyword_in_table_order() {
        // INSERT precedes DROP in the table regardless of position in the query
        assert_eq!(keyword_of("DROP x; INSERT y").as_deref(), Some("INSERT"));
    }

    #[test]
    fn test_comment_patterns() {
        assert_eq!(pattern_of("SELECT * FROM t -- trailing").as_deref(), Some("SQL line comment"));
        assert_eq!(pattern_of("SELECT /* hidden */ 1").as_deref(), Some("SQL block comment"));
        assert_eq!(pattern_of("SELECT 1 # mysql").as_deref(), Some("hash comment"));
    }

    #[test]
    fn test_stacked_statement_pattern() {
        assert_eq!(
            pattern_of("SELECT 1;  DROP TABLE users").as_deref(),
            Some("stacked statement")
        );
        assert!(pattern_of("SELECT 1; SELECT 2").is_none());
    }

    #[test]
    fn test_file_and_exec_functions() {
        assert!(pattern_of("SELECT pg_read_file('/etc/passwd')").is_some());
        assert!(pattern_of("SELECT * FROM t INTO OUTFILE '/tmp/x'").is_some());
        assert!(pattern_of("SELECT * FROM OPENROWSET('x')").is_some());
        assert!(pattern_of("SELECT xp_cmdshell('dir')").is_some());
        assert!(pattern_of("SELECT pg_sleep(10)").is_some());
    }

    #[test]
    fn test_tautology_patterns() {
        assert!(pattern_of("SELECT * FROM users WHERE name = '' OR '1'='1'").is_some());
        assert!(pattern_of("SELECT * FROM users WHERE id = 1 OR 1=1").is_some());
    }

    #[test]
    fn test_obfuscation_patterns() {
        assert!(pattern_of("SELECT 0x4142434445464748494A").is_some());
        assert!(pattern_of("SELECT CHAR(65)+CHAR(66)+CHAR(67)+CHAR(68)").is_some());
        assert!(pattern_of("SELECT CHR(65)||CHR(66)||CHR(67)||CHR(68)").is_some());
    }
}
