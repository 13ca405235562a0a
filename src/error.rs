//! Error taxonomy for the dataset core.
//!
//! This module defines a single error enumeration shared across the row store,
//! commit/manifest engine, permission service, job queue, and transform
//! workers. It integrates with `thiserror` to provide `Display` and error
//! source chaining, and carries the structured context the (out-of-scope)
//! HTTP layer needs to build a `{error, message, details, request_id}`
//! response without re-deriving it from a string.
//!
//! Notes:
//! - Each variant corresponds to exactly one entry of the taxonomy in the
//!   specification's error-handling section.
//! - `code()` returns the stable machine-readable identifier; `is_retryable()`
//!   tells callers (workers, commands) whether a bare retry could ever help —
//!   it never can for this taxonomy, but the method documents that decision
//!   at the type rather than leaving it to be rediscovered at call sites.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The addressed entity does not exist.
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    /// Input violates a stated validation rule.
    #[error("validation failed for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Authorization failure; carries the resource and required level.
    #[error("user {user_id} lacks {required} on {resource_type} '{resource_id}'")]
    PermissionDenied {
        resource_type: &'static str,
        resource_id: String,
        user_id: i64,
        required: &'static str,
    },

    /// Duplicate key, CAS failure on a ref, or ref-moved-since-job-queued.
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// Operation not allowed given the current state of the target entity.
    #[error("business rule '{rule}' violated: {detail}")]
    BusinessRuleViolation { rule: &'static str, detail: String },

    /// Upload exceeds the configured max size, or a quota was exceeded.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The injected parser/executor subsystem failed.
    #[error("external service error: {0}")]
    ExternalServiceError(String),

    /// Last-resort catch-all for unexpected failures.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("sql parse error: {0}")]
    SqlParse(#[from] sqlparser::parser::ParserError),
}

impl CoreError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        CoreError::Conflict {
            reason: reason.into(),
        }
    }

    pub fn business_rule(rule: &'static str, detail: impl Into<String>) -> Self {
        CoreError::BusinessRuleViolation {
            rule,
            detail: detail.into(),
        }
    }

    /// Stable machine-readable identifier, suitable for the `error` field of
    /// the structured API envelope described in the specification.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "not_found",
            CoreError::Validation { .. } => "validation_error",
            CoreError::PermissionDenied { .. } => "permission_denied",
            CoreError::Conflict { .. } => "conflict",
            CoreError::BusinessRuleViolation { .. } => "business_rule_violation",
            CoreError::ResourceExhausted(_) => "resource_exhausted",
            CoreError::ExternalServiceError(_) => "external_service_error",
            CoreError::Internal(_) => "internal",
            CoreError::Database(_) => "internal",
            CoreError::Io(_) => "internal",
            CoreError::Json(_) => "validation_error",
            CoreError::Csv(_) => "external_service_error",
            CoreError::Excel(_) => "external_service_error",
            CoreError::Parquet(_) => "external_service_error",
            CoreError::SqlParse(_) => "validation_error",
        }
    }

    /// The HTTP status an API surface should map this error to. The mapping
    /// lives here, not in a router, so it can be unit tested without a server.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::NotFound { .. } => 404,
            CoreError::Validation { .. } | CoreError::Json(_) | CoreError::SqlParse(_) => 422,
            CoreError::PermissionDenied { .. } => 403,
            CoreError::Conflict { .. } => 409,
            CoreError::BusinessRuleViolation { .. } => 400,
            CoreError::ResourceExhausted(_) => 429,
            CoreError::ExternalServiceError(_) | CoreError::Csv(_) | CoreError::Excel(_) | CoreError::Parquet(_) => 502,
            CoreError::Internal(_) | CoreError::Database(_) | CoreError::Io(_) => 500,
        }
    }

    /// CAS conflicts and their kin are never silently retried by the core;
    /// the caller decides. This is documentation, not a scheduler hook.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn not_found_maps_to_404() {
        let err = CoreError::not_found("dataset", "42");
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = CoreError::conflict("ref moved since the job was queued");
        assert_matches!(err, CoreError::Conflict { .. });
        assert_eq!(CoreError::conflict("x").http_status(), 409);
    }

    #[test]
    fn business_rule_violation_maps_to_400() {
        let err = CoreError::business_rule("job_status_transition", "cannot cancel a completed job");
        assert_matches!(err, CoreError::BusinessRuleViolation { rule: "job_status_transition", .. });
        assert_eq!(CoreError::business_rule("r", "d").http_status(), 400);
    }

    #[test]
    fn no_variant_is_retryable() {
        assert!(!CoreError::not_found("x", "1").is_retryable());
        assert!(!CoreError::conflict("x").is_retryable());
        assert!(!CoreError::Internal("boom".into()).is_retryable());
    }

    #[test]
    fn json_error_is_a_validation_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CoreError = parse_err.into();
        assert_matches!(err, CoreError::Json(_));
        assert_eq!(err.code(), "validation_error");
        assert_eq!(err.http_status(), 422);
    }
}
