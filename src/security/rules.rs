//! Declarative rule tables for the keyword and injection scanners.
//!
//! Rules are plain data: a list of dangerous keywords and a list of regular
//! expressions with a description. The built-in tables cover the known
//! unsafe constructs; a JSON rule file can extend them without touching the
//! validation pipeline.

use crate::error::GuardError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Keywords that are never allowed in a read-only query, matched as whole
/// words regardless of case.
const BUILTIN_KEYWORDS: &[&str] = &[
    // Data modification
    "INSERT",
    "UPDATE",
    "DELETE",
    "MERGE",
    "REPLACE",
    "UPSERT",
    // Schema modification
    "DROP",
    "CREATE",
    "ALTER",
    "TRUNCATE",
    "RENAME",
    // Permissions
    "GRANT",
    "REVOKE",
    "DENY",
    // Procedural / transactional
    "EXEC",
    "EXECUTE",
    "CALL",
    "DECLARE",
    "SET",
    "COMMIT",
    "ROLLBACK",
    "BEGIN",
    "SAVEPOINT",
    // File / export
    "COPY",
    "UNLOAD",
    "OUTFILE",
    "DUMPFILE",
    "LOAD_FILE",
    // Database / server level
    "ATTACH",
    "DETACH",
    "VACUUM",
    "BACKUP",
    "RESTORE",
    "SHUTDOWN",
];

/// Injection patterns as (regex, description) pairs.
const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    // Stacked statements
    (
        r"(?i);\s*(DROP|DELETE|INSERT|UPDATE|ALTER|CREATE|TRUNCATE|EXEC|EXECUTE|GRANT|REVOKE|SHUTDOWN)\b",
        "stacked statement",
    ),
    // Comment-based truncation
    (r"--", "SQL line comment"),
    (r"/\*", "SQL block comment"),
    (r"#", "hash comment"),
    // Tautologies
    (r"(?i)'\s*OR\s+'[^']*'\s*=\s*'", "OR tautology"),
    (r"(?i)\bOR\s+1\s*=\s*1\b", "OR 1=1 tautology"),
    // Time-based blind injection
    (r"(?i)\bWAITFOR\s+DELAY\b", "time delay (WAITFOR)"),
    (r"(?i)\bpg_sleep\s*\(", "time delay (pg_sleep)"),
    (r"(?i)\bSLEEP\s*\(", "time delay (SLEEP)"),
    (r"(?i)\bBENCHMARK\s*\(", "time delay (BENCHMARK)"),
    // File I/O functions
    (r"(?i)\bINTO\s+(OUT|DUMP)FILE\b", "file write (INTO OUTFILE)"),
    (r"(?i)\bpg_read_(binary_)?file\s*\(", "file read (pg_read_file)"),
    (r"(?i)\bpg_ls_dir\s*\(", "directory listing (pg_ls_dir)"),
    (r"(?i)\blo_(import|export)\s*\(", "large object file access"),
    (r"(?i)\bUTL_(FILE|HTTP)\b", "Oracle file/network package"),
    (r"(?i)\bOPENROWSET\b", "external data access (OPENROWSET)"),
    (r"(?i)\bOPENDATASOURCE\b", "external data access (OPENDATASOURCE)"),
    (r"(?i)\bOPENQUERY\b", "external data access (OPENQUERY)"),
    (r"(?i)\bBULK\s+INSERT\b", "bulk file load"),
    // Engine-specific execution
    (r"(?i)\bxp_\w+", "extended stored procedure"),
    (r"(?i)\bsp_oa\w+", "OLE automation procedure"),
    (r"(?i)\bsp_executesql\b", "dynamic SQL execution"),
    (r"(?i)\bdblink\w*\s*\(", "cross-database link"),
    (r"(?i)\bDBMS_\w+", "Oracle system package"),
    // Obfuscation
    (r"0x[0-9a-fA-F]{10,}", "long hex-encoded string"),
    (
        r"(?i)CHA?R\s*\(\s*\d+\s*\)(\s*(\+|\|\|)\s*CHA?R\s*\(\s*\d+\s*\)){3,}",
        "CHAR() obfuscation",
    ),
];

/// A single injection pattern rule as written in a rule file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Regular expression (Rust `regex` syntax)
    pub pattern: String,
    /// Short description shown to the caller when the pattern matches
    pub description: String,
}

/// Uncompiled rule tables.
///
/// This is the on-disk format:
///
/// ```json
/// {
///   "dangerous_keywords": ["PRAGMA"],
///   "injection_patterns": [
///     { "pattern": "(?i)\\bload_extension\\s*\\(", "description": "extension loading" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RuleSet {
    pub dangerous_keywords: Vec<String>,
    pub injection_patterns: Vec<PatternRule>,
}

impl RuleSet {
    /// The built-in rule tables.
    pub fn builtin() -> Self {
        Self {
            dangerous_keywords: BUILTIN_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            injection_patterns: BUILTIN_PATTERNS
                .iter()
                .map(|(pattern, description)| PatternRule {
                    pattern: pattern.to_string(),
                    description: description.to_string(),
                })
                .collect(),
        }
    }

    /// Parse a rule set from JSON text.
    pub fn from_json(json: &str) -> Result<Self, GuardError> {
        serde_json::from_str(json).map_err(|e| GuardError::json("rule file", e))
    }

    /// Load a rule set from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GuardError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| GuardError::io(path.display().to_string(), e))?;
        Self::from_json(&text)
    }

    /// Append another rule set, skipping entries already present.
    ///
    /// Merging only ever adds rules, so a rule file cannot weaken the
    /// built-in tables.
    pub fn merge(mut self, other: RuleSet) -> Self {
        for keyword in other.dangerous_keywords {
            let exists = self
                .dangerous_keywords
                .iter()
                .any(|k| k.eq_ignore_ascii_case(&keyword));
            if !exists {
                self.dangerous_keywords.push(keyword);
            }
        }
        for rule in other.injection_patterns {
            if !self
                .injection_patterns
                .iter()
                .any(|r| r.pattern == rule.pattern)
            {
                self.injection_patterns.push(rule);
            }
        }
        self
    }
}

/// A compiled dangerous keyword.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    /// Keyword as reported to the caller (upper-case)
    pub keyword: String,
    regex: Regex,
}

impl KeywordRule {
    /// Check whether the keyword occurs as a whole word.
    pub fn is_match(&self, sql: &str) -> bool {
        self.regex.is_match(sql)
    }
}

/// A compiled injection pattern.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// Description reported to the caller
    pub description: String,
    regex: Regex,
}

impl CompiledPattern {
    /// Check whether the pattern matches.
    pub fn is_match(&self, sql: &str) -> bool {
        self.regex.is_match(sql)
    }

    /// Source text of the regular expression.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// Compiled rule registry used by the scanner.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    keywords: Vec<KeywordRule>,
    patterns: Vec<CompiledPattern>,
}

/// Built-in registry, compiled once at first use.
///
/// The built-in tables are hardcoded constants verified by tests, so a
/// compile failure here is a programmer error.
static BUILTIN_REGISTRY: Lazy<Arc<RuleRegistry>> = Lazy::new(|| {
    let registry = RuleRegistry::compile(&RuleSet::builtin())
        .unwrap_or_else(|e| panic!("Internal error: invalid built-in rule: {}", e));
    Arc::new(registry)
});

impl RuleRegistry {
    /// Compile a rule set.
    pub fn compile(rules: &RuleSet) -> Result<Self, GuardError> {
        let mut keywords = Vec::with_capacity(rules.dangerous_keywords.len());
        for keyword in &rules.dangerous_keywords {
            let trimmed = keyword.trim();
            if trimmed.is_empty() {
                return Err(GuardError::config("Dangerous keyword cannot be empty"));
            }
            let pattern = keyword_pattern(trimmed);
            let regex =
                Regex::new(&pattern).map_err(|e| GuardError::invalid_rule(pattern.clone(), e))?;
            keywords.push(KeywordRule {
                keyword: trimmed.to_uppercase(),
                regex,
            });
        }

        let mut patterns = Vec::with_capacity(rules.injection_patterns.len());
        for rule in &rules.injection_patterns {
            let regex = Regex::new(&rule.pattern)
                .map_err(|e| GuardError::invalid_rule(rule.pattern.clone(), e))?;
            patterns.push(CompiledPattern {
                description: rule.description.clone(),
                regex,
            });
        }

        Ok(Self { keywords, patterns })
    }

    /// Shared handle to the built-in registry.
    pub fn builtin() -> Arc<RuleRegistry> {
        Arc::clone(&BUILTIN_REGISTRY)
    }

    /// Built-in rules extended with the rules in a JSON file.
    pub fn with_rule_file(path: impl AsRef<Path>) -> Result<Self, GuardError> {
        let extra = RuleSet::from_file(path)?;
        Self::compile(&RuleSet::builtin().merge(extra))
    }

    /// Compiled keyword rules, in table order.
    pub fn keywords(&self) -> &[KeywordRule] {
        &self.keywords
    }

    /// Compiled injection patterns, in table order.
    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }
}

/// Build a case-insensitive whole-word regex for a keyword. Interior
/// whitespace in multi-word keywords matches any run of whitespace.
fn keyword_pattern(keyword: &str) -> String {
    let body = keyword
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    format!(r"(?i)\b{}\b", body)
}
