//! "Did you mean" suggestions for unknown table names.
//!
//! Similarity is a token-sort ratio: both names are split into
//! alphanumeric tokens, the tokens are sorted and re-joined, and the
//! normalized Levenshtein similarity of the results is scaled to 0-100.
//! `order_items` and `items_order` therefore score 100.

use crate::constants::{
    DEFAULT_LIKELY_MATCH_THRESHOLD, DEFAULT_MAX_SUGGESTIONS, DEFAULT_SUGGESTION_THRESHOLD,
    MAX_SIMILARITY_SCORE,
};
use std::cmp::Ordering;
use strsim::normalized_levenshtein;

/// Minimum length for substring containment to count as a likely match.
const MIN_SUBSTRING_LEN: usize = 3;

/// Token-order-insensitive similarity of two names, from 0 to 100.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = token_sort_key(a);
    let b = token_sort_key(b);
    normalized_levenshtein(&a, &b) * MAX_SIMILARITY_SCORE
}

fn token_sort_key(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// A ranked candidate for an unknown name.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub name: String,
    pub score: f64,
    /// Above the likely threshold, or one name contains the other
    pub likely: bool,
}

/// Ranks known names against an unknown one.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    likely_threshold: f64,
    suggestion_threshold: f64,
    max_suggestions: usize,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(
            DEFAULT_LIKELY_MATCH_THRESHOLD,
            DEFAULT_SUGGESTION_THRESHOLD,
            DEFAULT_MAX_SUGGESTIONS,
        )
    }
}

impl FuzzyMatcher {
    pub fn new(likely_threshold: f64, suggestion_threshold: f64, max_suggestions: usize) -> Self {
        Self {
            likely_threshold,
            suggestion_threshold,
            max_suggestions,
        }
    }

    /// Score every candidate and keep the plausible ones.
    ///
    /// Likely matches rank first, then by descending score; ties break on
    /// name so the order is deterministic. At most `max_suggestions` are
    /// returned.
    pub fn rank<S: AsRef<str>>(&self, unknown: &str, candidates: &[S]) -> Vec<Suggestion> {
        let unknown = unknown.to_lowercase();
        let mut ranked: Vec<Suggestion> = candidates
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| !c.eq_ignore_ascii_case(&unknown))
            .filter_map(|candidate| {
                let score = similarity(&unknown, candidate);
                let likely = score >= self.likely_threshold || is_substring_match(&unknown, candidate);
                (likely || score >= self.suggestion_threshold).then(|| Suggestion {
                    name: candidate.to_string(),
                    score,
                    likely,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.likely
                .cmp(&a.likely)
                .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked.truncate(self.max_suggestions);
        ranked
    }

    /// Names of the ranked candidates.
    pub fn suggest<S: AsRef<str>>(&self, unknown: &str, candidates: &[S]) -> Vec<String> {
        self.rank(unknown, candidates)
            .into_iter()
            .map(|s| s.name)
            .collect()
    }

    /// Maximum number of suggestions returned.
    pub fn max_suggestions(&self) -> usize {
        self.max_suggestions
    }
}

/// `cust` / `customers`, `orders` / `sales_orders`.
fn is_substring_match(a: &str, b: &str) -> bool {
    let b = b.to_lowercase();
    let (short, long) = if a.len() <= b.len() { (a, b.as_str()) } else { (b.as_str(), a) };
    short.chars().count() >= MIN_SUBSTRING_LEN && long.contains(short)
}
