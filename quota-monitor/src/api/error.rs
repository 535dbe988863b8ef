//! Error responses.
//!
//! Every failure renders as `{"code", "message", "details"?}` with a matching
//! HTTP status.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use crate::error::Error;
use crate::quota::{FailureKind, QuotaFailure};

/// Handler error, serialized as the response body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    /// Stable, upper snake case.
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    /// Coded by the failure kind, e.g. `RATE_LIMITED`. Unknown accounts are
    /// 404 and malformed sessions 422. Everything the remote side rejected
    /// is 400.
    pub fn from_quota_failure(failure: &QuotaFailure) -> Self {
        let status = match failure.kind {
            FailureKind::NotFound => StatusCode::NOT_FOUND,
            FailureKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            FailureKind::Auth
            | FailureKind::RateLimited
            | FailureKind::Timeout
            | FailureKind::Network
            | FailureKind::Remote => StatusCode::BAD_REQUEST,
        };
        let code = failure.kind.as_ref().to_ascii_uppercase();
        Self::new(status, code, failure.message.clone()).with_details(json!({
            "kind": failure.kind,
            "status": failure.status,
            "observed_at": failure.observed_at,
        }))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound { entity_type, id } => {
                Self::not_found(format!("{entity_type} with id '{id}' not found"))
            }
            Error::Validation(msg) => Self::validation(msg),
            Error::SessionRejected(failure) => Self::from_quota_failure(&failure),
            Error::Configuration(msg) | Error::ApiError(msg) => Self::bad_request(msg),
            Error::DatabaseSqlx(e) => {
                tracing::error!(error = %e, "Database error while handling request");
                Self::internal("Database error occurred")
            }
            other => {
                tracing::error!(error = %other, "Unexpected error while handling request");
                Self::internal("An unexpected error occurred")
            }
        }
    }
}

/// Malformed or incomplete request bodies get the same JSON error shape as
/// every other failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        let err: ApiError = Error::not_found("Account", "abc").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "Account with id 'abc' not found");
    }

    #[test]
    fn test_validation_mapping() {
        let err: ApiError = Error::validation("Missing required cookies: t").into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_quota_failure_mapping() {
        let failure = QuotaFailure::new(FailureKind::RateLimited, "slow down").with_status(429);
        let err: ApiError = Error::SessionRejected(failure).into();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "RATE_LIMITED");
        assert_eq!(err.message, "slow down");
        assert_eq!(err.details.unwrap()["status"], json!(429));
    }

    #[test]
    fn test_body_omits_status() {
        let body = serde_json::to_value(ApiError::not_found("gone")).unwrap();
        assert_eq!(body, json!({"code": "NOT_FOUND", "message": "gone"}));
    }

    #[test]
    fn test_database_error_is_hidden() {
        let err: ApiError = Error::DatabaseSqlx(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Database error occurred");
    }
}
