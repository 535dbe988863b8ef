//! Account routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post, put},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    AccountResponse, CreateAccountRequest, RefreshResponse, UpdateAccountRequest,
};
use crate::api::server::AppState;
use crate::domain::Account;
use crate::quota::{QuotaOutcome, QuotaRefreshService};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route("/{id}", put(update_account).delete(delete_account))
        .route("/{id}/latest-usage", get(latest_usage))
        .route("/{id}/refresh", post(refresh_account))
}

fn quota_service(state: &AppState) -> ApiResult<&Arc<QuotaRefreshService>> {
    state
        .quota_service
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Quota service not available"))
}

fn to_response(service: &QuotaRefreshService, account: Account) -> AccountResponse {
    let failures = service.failure_tracker().failure_count(&account.id);
    AccountResponse::from_account(account, failures)
}

async fn list_accounts(State(state): State<AppState>) -> ApiResult<Json<Vec<AccountResponse>>> {
    let service = quota_service(&state)?;
    let accounts = service.list_accounts().await?;
    Ok(Json(
        accounts
            .into_iter()
            .map(|account| to_response(service, account))
            .collect(),
    ))
}

/// Validate and test the session, then create the account.
async fn create_account(
    State(state): State<AppState>,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    let Json(request) = body?;
    let service = quota_service(&state)?;
    let account = service
        .create_account(&request.name, &request.cookies)
        .await?;
    Ok((StatusCode::CREATED, Json(to_response(service, account))))
}

/// Replace the session after re-validating and re-testing it.
async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> ApiResult<Json<AccountResponse>> {
    let Json(request) = body?;
    let service = quota_service(&state)?;
    let account = service.update_session(&id, &request.cookies).await?;
    Ok(Json(to_response(service, account)))
}

async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    quota_service(&state)?.delete_account(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn latest_usage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<QuotaOutcome>> {
    quota_service(&state)?
        .latest_snapshot(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No usage data found"))
}

/// Manual refresh through the same path the scheduler uses.
async fn refresh_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RefreshResponse>> {
    let outcome = quota_service(&state)?.refresh(&id).await?;
    match outcome {
        QuotaOutcome::Failure(failure) => Err(ApiError::from_quota_failure(&failure)),
        success => Ok(Json(RefreshResponse {
            success: true,
            data: success,
        })),
    }
}
