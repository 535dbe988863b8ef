//! Health check routes.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::ApiResult;
use crate::api::models::{ComponentHealth, HealthResponse};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

/// Health check endpoint.
///
/// Reports `degraded` when the database probe fails; the endpoint itself
/// always answers 200 so it stays usable as a liveness probe.
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let mut components = Vec::new();
    let mut healthy = true;

    if let Some(pool) = &state.db_pool {
        let component = match crate::database::ping(pool).await {
            Ok(()) => ComponentHealth {
                name: "database".to_string(),
                status: "healthy".to_string(),
                message: None,
            },
            Err(e) => {
                healthy = false;
                ComponentHealth {
                    name: "database".to_string(),
                    status: "unhealthy".to_string(),
                    message: Some(e.to_string()),
                }
            }
        };
        components.push(component);
    }

    let stats = match &state.quota_service {
        Some(service) => service
            .stats()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to collect account stats"))
            .ok(),
        None => None,
    };

    Ok(Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        components,
        scheduler: state.scheduler.as_ref().map(|s| s.status()),
        stats,
    }))
}
