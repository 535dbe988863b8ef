//! Offline session format checks and live session tests.

use super::client::QuotaClient;
use super::types::{SessionTestResult, ValidationResult};

/// Cookies the quota endpoint needs to accept a session.
pub const REQUIRED_COOKIES: [&str; 4] = ["csrf_session", "csrf_token", "t", "m_session_id"];

/// Check that a session carries every required cookie. No network access.
pub fn validate_format(session: &str) -> ValidationResult {
    if session.trim().is_empty() {
        return ValidationResult {
            valid: false,
            message: "Session must be a non-empty cookie string".to_string(),
            missing: REQUIRED_COOKIES.iter().map(|s| s.to_string()).collect(),
        };
    }

    let cookies = session_cookies::parse(session);
    let missing: Vec<String> = REQUIRED_COOKIES
        .iter()
        .filter(|name| !cookies.contains(name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        ValidationResult {
            valid: true,
            message: "Session format is valid".to_string(),
            missing,
        }
    } else {
        ValidationResult {
            valid: false,
            message: format!("Missing required cookies: {}", missing.join(", ")),
            missing,
        }
    }
}

/// Validate the format and, only if it passes, make one live quota call.
pub async fn test_session<C>(client: &C, session: &str) -> SessionTestResult
where
    C: QuotaClient + ?Sized,
{
    let validation = validate_format(session);
    if !validation.valid {
        return SessionTestResult {
            validation,
            fetch: None,
        };
    }

    let fetch = client.fetch_quota(Some(session)).await;
    SessionTestResult {
        validation,
        fetch: Some(fetch),
    }
}
