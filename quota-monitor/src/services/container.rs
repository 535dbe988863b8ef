//! Service container for dependency injection.
//!
//! Builds the repository, quota client, refresh service and scheduler once
//! and hands out shared references.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Result;
use crate::api::AppState;
use crate::config::AppConfig;
use crate::database::repositories::{AccountRepository, SqlxAccountRepository};
use crate::database::{DbPool, WritePool};
use crate::quota::{ModelScopeClient, QuotaClient, QuotaRefreshService};
use crate::scheduler::{RefreshScheduler, SchedulerHandle};

/// Service container holding all application services.
pub struct ServiceContainer {
    /// Read pool.
    pub pool: DbPool,
    pub quota_service: Arc<QuotaRefreshService>,
    pub scheduler: Arc<RefreshScheduler>,
    config: AppConfig,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Wire services against the real database and quota API.
    pub fn new(config: AppConfig, pool: DbPool, write_pool: WritePool) -> Result<Self> {
        let repository: Arc<dyn AccountRepository> =
            Arc::new(SqlxAccountRepository::new(pool.clone(), write_pool));
        let client: Arc<dyn QuotaClient> = Arc::new(ModelScopeClient::new(
            &config.quota_base_url,
            config.request_timeout,
        )?);

        Ok(Self::with_parts(config, pool, repository, client))
    }

    /// Wire services around given collaborators.
    pub fn with_parts(
        config: AppConfig,
        pool: DbPool,
        repository: Arc<dyn AccountRepository>,
        client: Arc<dyn QuotaClient>,
    ) -> Self {
        info!("Initializing service container");

        let quota_service = Arc::new(QuotaRefreshService::new(repository, client));
        let scheduler = Arc::new(RefreshScheduler::new(quota_service.clone()));

        Self {
            pool,
            quota_service,
            scheduler,
            config,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Start the refresh scheduler on the configured schedule.
    pub fn start_scheduler(&self) -> SchedulerHandle {
        self.scheduler.start(self.config.refresh_schedule.clone())
    }

    /// API state backed by this container.
    pub fn app_state(&self) -> AppState {
        AppState::new()
            .with_quota_service(self.quota_service.clone())
            .with_scheduler(self.scheduler.clone())
            .with_db_pool(self.pool.clone())
    }

    /// Token cancelled on shutdown, shared with background tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn shutdown(&self) {
        info!("Shutting down services");
        self.cancellation_token.cancel();
    }
}
