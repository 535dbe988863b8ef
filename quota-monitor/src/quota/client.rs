//! Remote quota endpoint client.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{COOKIE, SET_COOKIE};
use session_cookies::{RotationDirective, directives_from_set_cookie};
use tracing::{debug, warn};

use super::types::{FailureKind, FetchResult, QuotaFailure, QuotaOutcome};
use crate::Result;
use crate::utils::http_client::build_quota_client;

/// Path of the rate-limit endpoint under the API base URL.
pub const RATE_LIMIT_PATH: &str = "/inference/rate-limit";

/// Per-call correlation header.
pub const TRACE_ID_HEADER: &str = "X-Modelscope-Trace-Id";

pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed - cookies may be expired or invalid";
pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded - too many requests";
pub const TIMEOUT_MESSAGE: &str = "Request timeout - server may be slow or unavailable";
pub const NETWORK_MESSAGE: &str = "Network error - unable to reach the quota API";

/// One authenticated call to the quota endpoint.
///
/// Implementations never fail: every problem is reported as a
/// [`QuotaOutcome::Failure`], alongside whatever cookie rotations the response
/// carried.
#[async_trait]
pub trait QuotaClient: Send + Sync {
    async fn fetch_quota(&self, session: Option<&str>) -> FetchResult;
}

/// HTTP client for the ModelScope rate-limit endpoint.
pub struct ModelScopeClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ModelScopeClient {
    /// Build a client with its own connection pool and the given call timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(build_quota_client(timeout)?, base_url))
    }

    /// Wrap an existing reqwest client. Its timeout is used as is.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), RATE_LIMIT_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QuotaClient for ModelScopeClient {
    async fn fetch_quota(&self, session: Option<&str>) -> FetchResult {
        let trace_id = uuid::Uuid::new_v4().to_string();

        let mut request = self
            .client
            .get(&self.endpoint)
            .header(TRACE_ID_HEADER, &trace_id);
        if let Some(session) = session.map(str::trim).filter(|s| !s.is_empty()) {
            request = request.header(COOKIE, session);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let failure = transport_failure(&e);
                warn!(trace_id = %trace_id, kind = %failure.kind, error = %e, "Quota request failed");
                return FetchResult::without_rotations(failure.into());
            }
        };

        // Rotations are taken before the status is looked at.
        let rotations = rotations_from_headers(response.headers());
        let status = response.status();

        let outcome = if status.is_success() {
            match response.json::<serde_json::Value>().await {
                Ok(payload) => QuotaOutcome::success(payload),
                Err(e) if e.is_timeout() => QuotaFailure::new(FailureKind::Timeout, TIMEOUT_MESSAGE)
                    .with_status(status.as_u16())
                    .into(),
                Err(e) => QuotaFailure::new(
                    FailureKind::Remote,
                    format!("Remote API returned an unreadable body: {e}"),
                )
                .with_status(status.as_u16())
                .into(),
            }
        } else {
            status_failure(status).into()
        };

        debug!(
            trace_id = %trace_id,
            status = status.as_u16(),
            success = outcome.is_success(),
            rotations = rotations.len(),
            "Quota request completed"
        );

        FetchResult::new(outcome, rotations)
    }
}

/// Header values may carry non-ASCII bytes; they are decoded lossily rather
/// than dropped so the rotation is not lost.
fn rotations_from_headers(headers: &reqwest::header::HeaderMap) -> Vec<RotationDirective> {
    let values: Vec<Cow<'_, str>> = headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
        .collect();
    directives_from_set_cookie(values.iter().map(|value| value.as_ref()))
}

/// Map a non-2xx status to a typed failure.
pub fn status_failure(status: StatusCode) -> QuotaFailure {
    let failure = match status {
        StatusCode::UNAUTHORIZED => QuotaFailure::new(FailureKind::Auth, AUTH_FAILED_MESSAGE),
        StatusCode::TOO_MANY_REQUESTS => {
            QuotaFailure::new(FailureKind::RateLimited, RATE_LIMITED_MESSAGE)
        }
        other => QuotaFailure::new(
            FailureKind::Remote,
            format!("Remote API returned status {}", other.as_u16()),
        ),
    };
    failure.with_status(status.as_u16())
}

fn transport_failure(err: &reqwest::Error) -> QuotaFailure {
    if err.is_timeout() {
        QuotaFailure::new(FailureKind::Timeout, TIMEOUT_MESSAGE)
    } else if err.is_builder() {
        QuotaFailure::new(
            FailureKind::Validation,
            "Session cannot be sent as a Cookie header",
        )
    } else {
        QuotaFailure::new(FailureKind::Network, NETWORK_MESSAGE)
    }
}
