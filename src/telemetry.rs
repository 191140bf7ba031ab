//! Validation metrics and request correlation.
//!
//! Counters are plain atomics so recording never blocks a validation; a
//! [`MetricsSnapshot`] is a serializable copy taken on demand.

use crate::constants::PERCENTAGE_MULTIPLIER;
use crate::error::Violation;
use crate::security::Verdict;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Generate a short correlation ID (8 characters) for compact logging.
pub fn generate_short_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Correlation information carried through one validation request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request.
    pub correlation_id: String,
    /// When the request was received.
    pub start_time: Instant,
    /// Caller-supplied request id, if any.
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Create a new request context with a generated correlation ID.
    pub fn new() -> Self {
        Self::with_correlation_id(generate_short_correlation_id())
    }

    /// Create a new request context with a specific correlation ID.
    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            start_time: Instant::now(),
            request_id: None,
        }
    }

    /// Attach the caller's request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log prefix in the form `[correlation] [request]`.
    pub fn log_prefix(&self) -> String {
        match &self.request_id {
            Some(id) => format!("[{}] [{}]", self.correlation_id, id),
            None => format!("[{}]", self.correlation_id),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Validation counters.
#[derive(Debug, Default)]
pub struct ValidationMetrics {
    pub validations_total: AtomicU64,
    pub validations_passed: AtomicU64,
    pub validations_rejected: AtomicU64,

    pub rejected_length: AtomicU64,
    pub rejected_statement_type: AtomicU64,
    pub rejected_keyword: AtomicU64,
    pub rejected_pattern: AtomicU64,
    pub rejected_multiple_statements: AtomicU64,
    pub rejected_unknown_tables: AtomicU64,

    /// Total validation time in microseconds.
    pub validation_time_us_total: AtomicU64,
}

impl ValidationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one validation.
    pub fn record(&self, verdict: &Verdict, duration: Duration) {
        self.validations_total.fetch_add(1, Ordering::Relaxed);
        self.validation_time_us_total
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        let Some(violation) = &verdict.violation else {
            self.validations_passed.fetch_add(1, Ordering::Relaxed);
            return;
        };
        self.validations_rejected.fetch_add(1, Ordering::Relaxed);

        let counter = match violation {
            Violation::QueryTooLong { .. } => &self.rejected_length,
            Violation::NotSelectOrCte => &self.rejected_statement_type,
            Violation::DangerousKeyword { .. } => &self.rejected_keyword,
            Violation::InjectionPattern { .. } => &self.rejected_pattern,
            Violation::MultipleStatements => &self.rejected_multiple_statements,
            Violation::UnknownTables { .. } => &self.rejected_unknown_tables,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            validations_total: self.validations_total.load(Ordering::Relaxed),
            validations_passed: self.validations_passed.load(Ordering::Relaxed),
            validations_rejected: self.validations_rejected.load(Ordering::Relaxed),
            rejected_length: self.rejected_length.load(Ordering::Relaxed),
            rejected_statement_type: self.rejected_statement_type.load(Ordering::Relaxed),
            rejected_keyword: self.rejected_keyword.load(Ordering::Relaxed),
            rejected_pattern: self.rejected_pattern.load(Ordering::Relaxed),
            rejected_multiple_statements: self
                .rejected_multiple_statements
                .load(Ordering::Relaxed),
            rejected_unknown_tables: self.rejected_unknown_tables.load(Ordering::Relaxed),
            validation_time_us_total: self.validation_time_us_total.load(Ordering::Relaxed),
        }
    }

    /// Rejected share of all validations, as a percentage.
    pub fn rejection_rate(&self) -> f64 {
        self.snapshot().rejection_rate()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub validations_total: u64,
    pub validations_passed: u64,
    pub validations_rejected: u64,
    pub rejected_length: u64,
    pub rejected_statement_type: u64,
    pub rejected_keyword: u64,
    pub rejected_pattern: u64,
    pub rejected_multiple_statements: u64,
    pub rejected_unknown_tables: u64,
    pub validation_time_us_total: u64,
}

impl MetricsSnapshot {
    pub fn avg_validation_time_us(&self) -> f64 {
        if self.validations_total == 0 {
            return 0.0;
        }
        self.validation_time_us_total as f64 / self.validations_total as f64
    }

    pub fn rejection_rate(&self) -> f64 {
        if self.validations_total == 0 {
            return 0.0;
        }
        (self.validations_rejected as f64 / self.validations_total as f64) * PERCENTAGE_MULTIPLIER
    }
}

/// Shared metrics type for thread-safe access.
pub type SharedMetrics = Arc<ValidationMetrics>;

/// Create a new shared metrics collector.
pub fn new_shared_metrics() -> SharedMetrics {
    Arc::new(ValidationMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(violation: Violation) -> Verdict {
        Verdict::invalid(violation)
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = ValidationMetrics::new();

        metrics.record(&Verdict::valid(), Duration::from_micros(100));
        metrics.record(&rejected(Violation::NotSelectOrCte), Duration::from_micros(50));
        metrics.record(
            &rejected(Violation::DangerousKeyword {
                keyword: "DROP".to_string(),
            }),
            Duration::from_micros(150),
        );

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.validations_total, 3);
        assert_eq!(snapshot.validations_passed, 1);
        assert_eq!(snapshot.validations_rejected, 2);
        assert_eq!(snapshot.rejected_statement_type, 1);
        assert_eq!(snapshot.rejected_keyword, 1);
        assert_eq!(snapshot.rejected_pattern, 0);
        assert_eq!(snapshot.validation_time_us_total, 300);
        assert!((snapshot.avg_validation_time_us() - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_rejection_rate() {
        let metrics = ValidationMetrics::new();
        assert_eq!(metrics.rejection_rate(), 0.0);

        for _ in 0..3 {
            metrics.record(&Verdict::valid(), Duration::ZERO);
        }
        metrics.record(&rejected(Violation::MultipleStatements), Duration::ZERO);

        assert!((metrics.rejection_rate() - 25.0).abs() < 0.01);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = ValidationMetrics::new();
        metrics.record(&Verdict::valid(), Duration::ZERO);
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["validations_total"], 1);
        assert_eq!(json["rejected_unknown_tables"], 0);
    }

    #[test]
    fn test_short_correlation_id() {
        let a = generate_short_correlation_id();
        let b = generate_short_correlation_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_context_log_prefix() {
        let ctx = RequestContext::with_correlation_id("abc12345");
        assert_eq!(ctx.log_prefix(), "[abc12345]");

        let ctx = ctx.with_request_id("42");
        assert_eq!(ctx.log_prefix(), "[abc12345] [42]");
        assert_eq!(RequestContext::new().correlation_id.len(), 8);
    }
}
