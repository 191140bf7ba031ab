//! Configuration management for the SQL guard.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.

use crate::constants::{
    DEFAULT_LIKELY_MATCH_THRESHOLD, DEFAULT_MAX_QUERY_LENGTH, DEFAULT_MAX_SUGGESTIONS,
    DEFAULT_SCHEMA_REFRESH_INTERVAL, DEFAULT_SCHEMA_REFRESH_SECS, DEFAULT_SUGGESTION_THRESHOLD,
    DEFAULT_TABLE_PREVIEW, MAX_SIMILARITY_SCORE,
};
use crate::error::GuardError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Guard configuration loaded from environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Validation pipeline settings
    pub validation: ValidationConfig,

    /// Extra rule table merged onto the built-in rules
    pub rules_file: Option<PathBuf>,

    /// Schema snapshot settings
    pub schema: SchemaConfig,
}

/// Validation pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum query length (characters)
    pub max_query_length: usize,

    /// Similarity (0-100) at which a known table is a likely match
    pub likely_match_threshold: f64,

    /// Similarity (0-100) at which a known table is suggested
    pub suggestion_threshold: f64,

    /// Maximum suggestions per verdict
    pub max_suggestions: usize,

    /// Maximum known tables listed when nothing similar is found
    pub table_preview: usize,
}

/// Schema snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// JSON snapshot file; no schema checks without one
    pub file: Option<PathBuf>,

    /// Reload interval; zero disables reloading
    pub refresh_interval: Duration,
}

impl GuardConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// All optional:
    /// - `SQL_GUARD_MAX_QUERY_LENGTH`: Maximum query length in characters (default: 10000)
    /// - `SQL_GUARD_LIKELY_THRESHOLD`: Likely-match similarity (default: 70)
    /// - `SQL_GUARD_SUGGESTION_THRESHOLD`: Suggestion similarity (default: 50)
    /// - `SQL_GUARD_MAX_SUGGESTIONS`: Suggestion cap (default: 5)
    /// - `SQL_GUARD_TABLE_PREVIEW`: Available-tables preview cap (default: 10)
    /// - `SQL_GUARD_RULES_FILE`: JSON rule file merged onto the built-in rules
    /// - `SQL_GUARD_SCHEMA_FILE`: JSON schema snapshot file
    /// - `SQL_GUARD_SCHEMA_REFRESH_SECS`: Snapshot reload interval, 0 disables (default: 300)
    pub fn from_env() -> Result<Self, GuardError> {
        let validation = ValidationConfig {
            max_query_length: env_parse("SQL_GUARD_MAX_QUERY_LENGTH")
                .unwrap_or(DEFAULT_MAX_QUERY_LENGTH),
            likely_match_threshold: env_parse("SQL_GUARD_LIKELY_THRESHOLD")
                .unwrap_or(DEFAULT_LIKELY_MATCH_THRESHOLD),
            suggestion_threshold: env_parse("SQL_GUARD_SUGGESTION_THRESHOLD")
                .unwrap_or(DEFAULT_SUGGESTION_THRESHOLD),
            max_suggestions: env_parse("SQL_GUARD_MAX_SUGGESTIONS")
                .unwrap_or(DEFAULT_MAX_SUGGESTIONS),
            table_preview: env_parse("SQL_GUARD_TABLE_PREVIEW").unwrap_or(DEFAULT_TABLE_PREVIEW),
        };
        validation.validate()?;

        let rules_file = env_path("SQL_GUARD_RULES_FILE");

        let refresh_secs =
            env_parse("SQL_GUARD_SCHEMA_REFRESH_SECS").unwrap_or(DEFAULT_SCHEMA_REFRESH_SECS);
        let schema = SchemaConfig {
            file: env_path("SQL_GUARD_SCHEMA_FILE"),
            refresh_interval: Duration::from_secs(refresh_secs),
        };

        Ok(GuardConfig {
            validation,
            rules_file,
            schema,
        })
    }
}

impl ValidationConfig {
    /// Check that the settings are consistent.
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.max_query_length == 0 {
            return Err(GuardError::config("Maximum query length must be positive"));
        }

        let in_range = |v: f64| (0.0..=MAX_SIMILARITY_SCORE).contains(&v);
        if !in_range(self.likely_match_threshold) || !in_range(self.suggestion_threshold) {
            return Err(GuardError::config(format!(
                "Similarity thresholds must be between 0 and {}",
                MAX_SIMILARITY_SCORE
            )));
        }
        if self.suggestion_threshold > self.likely_match_threshold {
            return Err(GuardError::config(format!(
                "Suggestion threshold ({}) must not exceed likely-match threshold ({})",
                self.suggestion_threshold, self.likely_match_threshold
            )));
        }

        Ok(())
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            likely_match_threshold: DEFAULT_LIKELY_MATCH_THRESHOLD,
            suggestion_threshold: DEFAULT_SUGGESTION_THRESHOLD,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
            table_preview: DEFAULT_TABLE_PREVIEW,
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            file: None,
            refresh_interval: DEFAULT_SCHEMA_REFRESH_INTERVAL,
        }
    }
}

/// Parse an environment variable, ignoring unset or unparsable values.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Read a non-empty path from an environment variable.
fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}
