//! Live log filter routes.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{LogFilterResponse, LogModuleInfo, UpdateLogFilterRequest};
use crate::api::server::AppState;
use crate::logging::{LoggingConfig, available_modules};

pub fn router() -> Router<AppState> {
    Router::new().route("/filter", get(get_filter).put(set_filter))
}

fn filter_response(config: &LoggingConfig) -> LogFilterResponse {
    LogFilterResponse {
        filter: config.get_filter(),
        available_modules: available_modules()
            .into_iter()
            .map(|(name, description)| LogModuleInfo {
                name: name.to_string(),
                description: description.to_string(),
            })
            .collect(),
    }
}

async fn get_filter(State(state): State<AppState>) -> ApiResult<Json<LogFilterResponse>> {
    let config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Logging configuration not available"))?;
    Ok(Json(filter_response(config)))
}

async fn set_filter(
    State(state): State<AppState>,
    Json(request): Json<UpdateLogFilterRequest>,
) -> ApiResult<Json<LogFilterResponse>> {
    let config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Logging configuration not available"))?;
    config.set_filter(&request.filter)?;
    Ok(Json(filter_response(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::create_router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_filter_unavailable_without_logging() {
        let router = create_router(AppState::new());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/logging/filter")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_available_modules_include_crate() {
        let modules = available_modules();
        assert!(modules.iter().any(|(name, _)| *name == "quota_monitor"));
    }
}
