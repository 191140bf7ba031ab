//! Centralized constants for the SQL guard.
//!
//! This module contains all limits, thresholds, and default values used
//! throughout the codebase, making them easy to find, understand, and modify.

use std::time::Duration;

// =============================================================================
// Query Limits
// =============================================================================

/// Maximum candidate query length, in characters.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 10_000;

// =============================================================================
// Suggestion Constants
// =============================================================================

/// Similarity score (0-100) at which a known table is a likely match.
pub const DEFAULT_LIKELY_MATCH_THRESHOLD: f64 = 70.0;

/// Similarity score (0-100) at which a known table is worth suggesting.
pub const DEFAULT_SUGGESTION_THRESHOLD: f64 = 50.0;

/// Maximum number of "did you mean" suggestions in a verdict.
pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

/// Maximum number of known tables listed when nothing similar is found.
pub const DEFAULT_TABLE_PREVIEW: usize = 10;

/// Upper bound of the similarity scale.
pub const MAX_SIMILARITY_SCORE: f64 = 100.0;

// =============================================================================
// Message Sanitization
// =============================================================================

/// Identifiers longer than this are truncated before being echoed in messages.
pub const MAX_ECHOED_IDENTIFIER_LENGTH: usize = 64;

/// Maximum number of unknown table names listed in a message.
pub const MAX_ECHOED_TABLES: usize = 5;

// =============================================================================
// Schema Refresh Constants
// =============================================================================

/// Default schema file reload interval in seconds.
pub const DEFAULT_SCHEMA_REFRESH_SECS: u64 = 300;

/// Default schema file reload interval as Duration.
pub const DEFAULT_SCHEMA_REFRESH_INTERVAL: Duration =
    Duration::from_secs(DEFAULT_SCHEMA_REFRESH_SECS);

// =============================================================================
// Logging Constants
// =============================================================================

/// Default truncation length for query logging.
pub const LOG_QUERY_TRUNCATE_LENGTH: usize = 100;

// =============================================================================
// Percentage Constants (for calculations)
// =============================================================================

/// Percentage multiplier for rate calculations.
pub const PERCENTAGE_MULTIPLIER: f64 = 100.0;
