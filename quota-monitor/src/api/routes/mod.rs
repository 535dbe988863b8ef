//! API route modules.

pub mod accounts;
pub mod health;
pub mod logging;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/accounts", accounts::router())
        .nest("/api/health", health::router())
        .nest("/api/logging", logging::router())
        .with_state(state)
}
