//! Quota call outcomes and session check results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use session_cookies::RotationDirective;
use strum::{AsRefStr, Display, EnumString};

/// Why a quota refresh did not produce a payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Session is malformed or incomplete. Detected offline.
    Validation,
    /// Unknown account id. Detected before any network call.
    NotFound,
    /// Remote rejected the session (HTTP 401).
    Auth,
    /// Remote throttled the monitoring call itself (HTTP 429).
    RateLimited,
    Timeout,
    Network,
    /// Any other non-2xx status, or an unreadable 2xx body.
    Remote,
}

impl FailureKind {
    /// Kinds that are decided before the remote endpoint is contacted.
    pub fn is_pre_network(self) -> bool {
        matches!(self, Self::Validation | Self::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuotaFailure {
    pub kind: FailureKind,
    pub message: String,
    /// HTTP status when the remote answered.
    pub status: Option<u16>,
    pub observed_at: DateTime<Utc>,
}

impl QuotaFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            observed_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Normalized result of one quota call. Also the shape of the stored snapshot.
///
/// Serializes as `{"success": true, "payload", "observed_at"}` or
/// `{"success": false, "kind", "message", "status"?, "observed_at"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "OutcomeRecord", try_from = "OutcomeRecord")]
pub enum QuotaOutcome {
    Success {
        payload: serde_json::Value,
        observed_at: DateTime<Utc>,
    },
    Failure(QuotaFailure),
}

impl QuotaOutcome {
    pub fn success(payload: serde_json::Value) -> Self {
        Self::Success {
            payload,
            observed_at: Utc::now(),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure(QuotaFailure::new(kind, message))
    }

    pub fn not_found(account_id: &str) -> Self {
        Self::failure(
            FailureKind::NotFound,
            format!("Account {account_id} not found"),
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(failure) => Some(failure.kind),
        }
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        match self {
            Self::Success { observed_at, .. } => *observed_at,
            Self::Failure(failure) => failure.observed_at,
        }
    }
}

impl From<QuotaFailure> for QuotaOutcome {
    fn from(failure: QuotaFailure) -> Self {
        Self::Failure(failure)
    }
}

#[derive(Serialize, Deserialize)]
struct OutcomeRecord {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    observed_at: DateTime<Utc>,
}

impl From<QuotaOutcome> for OutcomeRecord {
    fn from(outcome: QuotaOutcome) -> Self {
        match outcome {
            QuotaOutcome::Success {
                payload,
                observed_at,
            } => Self {
                success: true,
                payload: Some(payload),
                kind: None,
                message: None,
                status: None,
                observed_at,
            },
            QuotaOutcome::Failure(failure) => Self {
                success: false,
                payload: None,
                kind: Some(failure.kind),
                message: Some(failure.message),
                status: failure.status,
                observed_at: failure.observed_at,
            },
        }
    }
}

impl TryFrom<OutcomeRecord> for QuotaOutcome {
    type Error = String;

    fn try_from(record: OutcomeRecord) -> Result<Self, Self::Error> {
        if record.success {
            return Ok(Self::Success {
                payload: record.payload.unwrap_or(serde_json::Value::Null),
                observed_at: record.observed_at,
            });
        }

        let kind = record
            .kind
            .ok_or_else(|| "failed outcome without a kind".to_string())?;
        Ok(Self::Failure(QuotaFailure {
            kind,
            message: record.message.unwrap_or_default(),
            status: record.status,
            observed_at: record.observed_at,
        }))
    }
}

/// What one call to the quota endpoint produced.
///
/// `rotations` holds every `Set-Cookie` pair the response carried, whatever
/// the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub outcome: QuotaOutcome,
    pub rotations: Vec<RotationDirective>,
}

impl FetchResult {
    pub fn new(outcome: QuotaOutcome, rotations: Vec<RotationDirective>) -> Self {
        Self { outcome, rotations }
    }

    pub fn without_rotations(outcome: QuotaOutcome) -> Self {
        Self::new(outcome, Vec::new())
    }
}

/// Offline session format check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub message: String,
    /// Required cookie names absent from the session.
    pub missing: Vec<String>,
}

/// Format check followed, when the format is fine, by one live quota call.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTestResult {
    pub validation: ValidationResult,
    /// `None` when validation failed and no call was made.
    pub fetch: Option<FetchResult>,
}

impl SessionTestResult {
    pub fn format_valid(&self) -> bool {
        self.validation.valid
    }

    /// Only a successful live call makes a session usable.
    pub fn usable(&self) -> bool {
        self.fetch
            .as_ref()
            .is_some_and(|fetch| fetch.outcome.is_success())
    }

    pub fn message(&self) -> &str {
        match &self.fetch {
            None => &self.validation.message,
            Some(fetch) => match &fetch.outcome {
                QuotaOutcome::Success { .. } => "Session is valid",
                QuotaOutcome::Failure(failure) => &failure.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_serialization_shape() {
        let outcome = QuotaOutcome::success(json!({"limit": 100}));
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["success"], json!(true));
        assert_eq!(value["payload"], json!({"limit": 100}));
        assert!(value.get("kind").is_none());
        assert!(value["observed_at"].is_string());
    }

    #[test]
    fn test_failure_serialization_shape() {
        let outcome: QuotaOutcome = QuotaFailure::new(FailureKind::RateLimited, "slow down")
            .with_status(429)
            .into();
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["success"], json!(false));
        assert_eq!(value["kind"], json!("rate_limited"));
        assert_eq!(value["status"], json!(429));

        let back: QuotaOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn test_failure_without_kind_is_rejected() {
        let raw = r#"{"success":false,"observed_at":"2026-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<QuotaOutcome>(raw).is_err());
    }

    #[test]
    fn test_failure_kind_strings() {
        assert_eq!(FailureKind::RateLimited.to_string(), "rate_limited");
        assert_eq!("not_found".parse::<FailureKind>().unwrap(), FailureKind::NotFound);
        assert!(FailureKind::Validation.is_pre_network());
        assert!(!FailureKind::Auth.is_pre_network());
    }

    #[test]
    fn test_session_test_result_usable_only_on_success() {
        let validation = ValidationResult {
            valid: true,
            message: "Session format is valid".to_string(),
            missing: vec![],
        };
        let failed = SessionTestResult {
            validation: validation.clone(),
            fetch: Some(FetchResult::without_rotations(QuotaOutcome::failure(
                FailureKind::Auth,
                "expired",
            ))),
        };
        assert!(failed.format_valid());
        assert!(!failed.usable());
        assert_eq!(failed.message(), "expired");

        let ok = SessionTestResult {
            validation,
            fetch: Some(FetchResult::without_rotations(QuotaOutcome::success(
                json!({}),
            ))),
        };
        assert!(ok.usable());
    }
}
