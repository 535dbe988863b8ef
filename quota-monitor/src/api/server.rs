//! HTTP server: shared state, middleware and the serve loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::Request;
use axum::response::Response;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, MakeSpan, OnRequest, OnResponse,
    TraceLayer,
};
use tracing::{Level, Span};

use crate::api::routes;
use crate::config::AppConfig;
use crate::database::DbPool;
use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use crate::quota::QuotaRefreshService;
use crate::scheduler::RefreshScheduler;

/// Listen address and middleware switches.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Permissive CORS, for a dashboard served from another origin.
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: crate::config::DEFAULT_BIND_ADDRESS.to_string(),
            port: crate::config::DEFAULT_API_PORT,
            enable_cors: true,
        }
    }
}

impl ApiServerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            port: config.port,
            ..Self::default()
        }
    }
}

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub start_time: Instant,
    pub quota_service: Option<Arc<QuotaRefreshService>>,
    /// For status reporting only.
    pub scheduler: Option<Arc<RefreshScheduler>>,
    /// Probed by the health endpoint.
    pub db_pool: Option<DbPool>,
    pub logging_config: Option<Arc<LoggingConfig>>,
}

impl AppState {
    /// State with no services attached. Routes needing one answer 503.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            quota_service: None,
            scheduler: None,
            db_pool: None,
            logging_config: None,
        }
    }

    pub fn with_quota_service(mut self, service: Arc<QuotaRefreshService>) -> Self {
        self.quota_service = Some(service);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<RefreshScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    pub fn with_logging_config(mut self, logging_config: Arc<LoggingConfig>) -> Self {
        self.logging_config = Some(logging_config);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health checks are polled often and stay out of the request log.
fn is_health_probe(req: &Request) -> bool {
    req.uri().path().starts_with("/api/health")
}

/// HTTP server over [`routes::create_router`].
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn with_state(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops the server gracefully.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn build_router(&self) -> Router {
        let router = routes::create_router(self.state.clone()).layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if is_health_probe(req) {
                        Span::none()
                    } else {
                        DefaultMakeSpan::new().level(Level::INFO).make_span(req)
                    }
                })
                .on_request(|req: &Request, span: &Span| {
                    if !span.is_disabled() {
                        DefaultOnRequest::new()
                            .level(Level::INFO)
                            .on_request(req, span);
                    }
                })
                .on_response(|res: &Response, latency: Duration, span: &Span| {
                    if !span.is_disabled() {
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .on_response(res, latency, span);
                    }
                }),
        );

        if self.config.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Serve until the cancellation token fires.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::ApiError(format!("Failed to bind {addr}: {e}")))?;
        tracing::info!(address = %addr, "API server listening");

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down");
            })
            .await
            .map_err(|e| Error::ApiError(format!("Server error: {e}")))
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
