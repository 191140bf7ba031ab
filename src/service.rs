//! Guard service: the validator, the current schema and the metrics behind
//! one request handler.
//!
//! The service is cheap to clone; all state is shared via `Arc`.

use crate::config::GuardConfig;
use crate::constants::LOG_QUERY_TRUNCATE_LENGTH;
use crate::error::GuardError;
use crate::schema::{new_shared_schema, SchemaModel, SchemaSnapshot, SharedSchema};
use crate::security::{truncate_for_log, QueryValidator, RuleRegistry, Verdict};
use crate::telemetry::{new_shared_metrics, MetricsSnapshot, RequestContext, SharedMetrics};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// One validation request, as read from a JSON line.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    /// Opaque caller id, echoed back in the response
    #[serde(default)]
    pub id: Option<Value>,

    /// Candidate SQL
    pub sql: String,
}

/// Response to one request line.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateResponse {
    pub id: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,

    /// Set when the request line itself could not be understood
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidateResponse {
    fn verdict(id: Value, verdict: Verdict) -> Self {
        Self {
            id,
            verdict: Some(verdict),
            error: None,
        }
    }

    fn error(id: Value, error: impl Into<String>) -> Self {
        Self {
            id,
            verdict: None,
            error: Some(error.into()),
        }
    }
}

/// The SQL guard service.
#[derive(Debug, Clone)]
pub struct GuardService {
    validator: Arc<QueryValidator>,
    schema: SharedSchema,
    metrics: SharedMetrics,
}

impl GuardService {
    /// Build a service from configuration.
    ///
    /// The rule file, if configured, is loaded and merged onto the built-in
    /// rules here. The schema starts empty; see
    /// [`start_schema_refresh`](crate::schema::start_schema_refresh).
    pub fn new(config: &GuardConfig) -> Result<Self, GuardError> {
        config.validation.validate()?;

        let rules = match &config.rules_file {
            Some(path) => {
                let registry = RuleRegistry::with_rule_file(path)?;
                info!(
                    "Loaded rule file {} ({} keywords, {} patterns)",
                    path.display(),
                    registry.keywords().len(),
                    registry.patterns().len()
                );
                Arc::new(registry)
            }
            None => RuleRegistry::builtin(),
        };

        Ok(Self {
            validator: Arc::new(QueryValidator::new(&config.validation, rules)),
            schema: new_shared_schema(),
            metrics: new_shared_metrics(),
        })
    }

    /// Publish an initial schema snapshot.
    pub fn with_schema(self, snapshot: SchemaSnapshot) -> Self {
        self.schema.replace(snapshot);
        self
    }

    /// Handle to the schema consulted by this service.
    pub fn schema(&self) -> &SharedSchema {
        &self.schema
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Validate a query against the current schema snapshot.
    pub fn validate(&self, sql: &str) -> Verdict {
        self.validate_with_context(sql, &RequestContext::new())
    }

    /// Validate a query, logging under the given request context.
    pub fn validate_with_context(&self, sql: &str, ctx: &RequestContext) -> Verdict {
        // One snapshot per call; a concurrent refresh does not affect it
        let snapshot = self.schema.current();
        let schema = snapshot.as_deref().map(|s| s as &dyn SchemaModel);

        debug!(
            "{} Validating query: {}",
            ctx.log_prefix(),
            truncate_for_log(sql, LOG_QUERY_TRUNCATE_LENGTH)
        );
        let verdict = self.validator.validate(sql, schema);
        let elapsed = ctx.elapsed();
        self.metrics.record(&verdict, elapsed);

        match &verdict.violation {
            Some(violation) => info!(
                "{} Query rejected ({}) in {:?}",
                ctx.log_prefix(),
                violation.code(),
                elapsed
            ),
            None => debug!("{} Query accepted in {:?}", ctx.log_prefix(), elapsed),
        }
        verdict
    }

    /// Answer one request line.
    pub fn handle_request(&self, line: &str) -> ValidateResponse {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => return ValidateResponse::error(Value::Null, format!("Invalid JSON: {}", e)),
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);

        let request: ValidateRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => return ValidateResponse::error(id, format!("Invalid request: {}", e)),
        };

        let ctx = request_context(request.id.as_ref());
        let verdict = self.validate_with_context(&request.sql, &ctx);
        ValidateResponse::verdict(request.id.unwrap_or(Value::Null), verdict)
    }

    /// Answer one request line with a serialized response line.
    pub fn handle_line(&self, line: &str) -> Result<String, GuardError> {
        let response = self.handle_request(line);
        serde_json::to_string(&response).map_err(|e| GuardError::json("response", e))
    }
}

/// Request context carrying the caller's id; string ids are logged unquoted.
fn request_context(id: Option<&Value>) -> RequestContext {
    let ctx = RequestContext::new();
    match id {
        Some(Value::String(id)) => ctx.with_request_id(id.as_str()),
        Some(Value::Null) | None => ctx,
        Some(other) => ctx.with_request_id(other.to_string()),
    }
}
