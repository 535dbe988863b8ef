//! Refresh orchestration.
//!
//! A refresh loads the account, calls the quota endpoint with the stored
//! session, persists any cookie rotation the response carried and, on success
//! only, replaces the stored snapshot. Rotations are persisted before the
//! outcome is looked at: the remote re-issues expired tokens precisely on
//! failed calls.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::client::QuotaClient;
use super::tracker::RefreshFailureTracker;
use super::types::{FetchResult, QuotaOutcome, SessionTestResult};
use super::validation::test_session;
use crate::database::repositories::AccountRepository;
use crate::domain::{Account, AccountStats};
use crate::{Error, Result};

/// The per-account unit of work driven by the scheduler.
#[async_trait]
pub trait AccountRefresher: Send + Sync {
    /// Accounts a cycle should visit, in visiting order.
    async fn active_accounts(&self) -> Result<Vec<Account>>;

    /// Refresh one account.
    ///
    /// Every remote problem, and an unknown id, is an `Ok` outcome. `Err` means
    /// storage failed unexpectedly.
    async fn refresh(&self, account_id: &str) -> Result<QuotaOutcome>;
}

/// Quota refresh service.
///
/// Owns the refresh flow and the account flows built on the same
/// persistence stage (creation and session replacement).
pub struct QuotaRefreshService {
    repository: Arc<dyn AccountRepository>,
    client: Arc<dyn QuotaClient>,
    failure_tracker: Arc<RefreshFailureTracker>,
}

impl QuotaRefreshService {
    pub fn new(repository: Arc<dyn AccountRepository>, client: Arc<dyn QuotaClient>) -> Self {
        Self {
            repository,
            client,
            failure_tracker: Arc::new(RefreshFailureTracker::new()),
        }
    }

    /// Get the failure tracker (for testing or external access).
    pub fn failure_tracker(&self) -> Arc<RefreshFailureTracker> {
        Arc::clone(&self.failure_tracker)
    }

    /// Refresh the quota snapshot of one account.
    #[instrument(skip(self))]
    pub async fn refresh(&self, account_id: &str) -> Result<QuotaOutcome> {
        let Some(model) = self.repository.get_by_id(account_id).await? else {
            debug!("Account not found, nothing to refresh");
            return Ok(QuotaOutcome::not_found(account_id));
        };

        let fetch = self.client.fetch_quota(Some(&model.session)).await;
        self.apply_fetch(&model.id, &model.name, Some(&model.session), fetch)
            .await
    }

    /// Persist what one quota call produced for an account.
    ///
    /// A failed session write is logged and does not change the returned
    /// outcome. A failed snapshot write is an error.
    async fn apply_fetch(
        &self,
        account_id: &str,
        account_name: &str,
        session: Option<&str>,
        fetch: FetchResult,
    ) -> Result<QuotaOutcome> {
        let FetchResult { outcome, rotations } = fetch;

        if !rotations.is_empty()
            && let Some(merged) = session_cookies::merge(session, &rotations)
        {
            match self.repository.update_session(account_id, &merged).await {
                Ok(()) => info!(
                    account_id = %account_id,
                    account_name = %account_name,
                    rotated = rotations.len(),
                    "Persisted rotated session cookies"
                ),
                Err(e) => warn!(
                    account_id = %account_id,
                    account_name = %account_name,
                    error = %e,
                    "Failed to persist rotated session (non-fatal)"
                ),
            }
        }

        match &outcome {
            QuotaOutcome::Success { .. } => {
                let snapshot = serde_json::to_string(&outcome)?;
                self.repository
                    .update_snapshot(account_id, &snapshot)
                    .await?;
                self.failure_tracker.clear(account_id);
                info!(
                    account_id = %account_id,
                    account_name = %account_name,
                    "Quota snapshot updated"
                );
            }
            QuotaOutcome::Failure(failure) => {
                let failure_count =
                    self.failure_tracker
                        .record_failure(account_id, failure.kind, &failure.message);
                warn!(
                    account_id = %account_id,
                    account_name = %account_name,
                    kind = %failure.kind,
                    status = ?failure.status,
                    failure_count,
                    "Quota refresh failed: {}",
                    failure.message
                );
            }
        }

        Ok(outcome)
    }

    /// Run the format check and a live call, rejecting unusable sessions.
    async fn checked_session(&self, session: &str) -> Result<FetchResult> {
        let SessionTestResult { validation, fetch } =
            test_session(self.client.as_ref(), session).await;

        if !validation.valid {
            return Err(Error::Validation(validation.message));
        }

        match fetch {
            Some(fetch) => match &fetch.outcome {
                QuotaOutcome::Success { .. } => Ok(fetch),
                QuotaOutcome::Failure(failure) => Err(Error::SessionRejected(failure.clone())),
            },
            None => Err(Error::validation("Session was not tested")),
        }
    }

    /// Create an account from a session that passes both checks.
    ///
    /// The live call made while testing doubles as the first refresh, so the
    /// new account starts with a snapshot and any rotation it triggered.
    #[instrument(skip(self, session))]
    pub async fn create_account(&self, name: &str, session: &str) -> Result<Account> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Account name is required"));
        }
        let session = session.trim();

        let fetch = self.checked_session(session).await?;
        let model = self.repository.create(name, session).await?;
        info!(account_id = %model.id, "Account created");

        // The row exists from here on. Failing now would invite a retry that
        // creates a duplicate, so the first snapshot is best effort.
        if let Err(e) = self
            .apply_fetch(&model.id, &model.name, Some(session), fetch)
            .await
        {
            warn!(
                account_id = %model.id,
                error = %e,
                "Account created without its first snapshot"
            );
        }
        self.get_account(&model.id)
            .await?
            .ok_or_else(|| Error::not_found("Account", &model.id))
    }

    /// Replace the session of an account after re-validating and re-testing it.
    #[instrument(skip(self, session))]
    pub async fn update_session(&self, account_id: &str, session: &str) -> Result<Account> {
        let model = self
            .repository
            .get_by_id(account_id)
            .await?
            .ok_or_else(|| Error::not_found("Account", account_id))?;
        let session = session.trim();

        let fetch = self.checked_session(session).await?;
        self.repository.update_session(&model.id, session).await?;
        info!("Account session replaced");

        if let Err(e) = self
            .apply_fetch(&model.id, &model.name, Some(session), fetch)
            .await
        {
            warn!(
                account_id = %model.id,
                error = %e,
                "Session replaced without a fresh snapshot"
            );
        }
        self.get_account(&model.id)
            .await?
            .ok_or_else(|| Error::not_found("Account", &model.id))
    }

    #[instrument(skip(self))]
    pub async fn delete_account(&self, account_id: &str) -> Result<()> {
        self.repository.soft_delete(account_id).await?;
        self.failure_tracker.clear(account_id);
        info!("Account deactivated");
        Ok(())
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let models = self.repository.list_active().await?;
        Ok(models.into_iter().map(Account::from_db_model).collect())
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        let model = self.repository.get_by_id(account_id).await?;
        Ok(model.map(Account::from_db_model))
    }

    /// Latest snapshot of an account; `Ok(None)` until the first success.
    pub async fn latest_snapshot(&self, account_id: &str) -> Result<Option<QuotaOutcome>> {
        let account = self
            .get_account(account_id)
            .await?
            .ok_or_else(|| Error::not_found("Account", account_id))?;
        Ok(account.snapshot)
    }

    pub async fn stats(&self) -> Result<AccountStats> {
        self.repository.stats().await
    }
}

#[async_trait]
impl AccountRefresher for QuotaRefreshService {
    async fn active_accounts(&self) -> Result<Vec<Account>> {
        self.list_accounts().await
    }

    async fn refresh(&self, account_id: &str) -> Result<QuotaOutcome> {
        QuotaRefreshService::refresh(self, account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::test_support::{MemoryAccountRepository, ScriptedClient, VALID_SESSION};
    use crate::quota::types::{FailureKind, QuotaFailure};
    use serde_json::json;
    use session_cookies::RotationDirective;

    fn service(
        repo: &Arc<MemoryAccountRepository>,
        client: &Arc<ScriptedClient>,
    ) -> QuotaRefreshService {
        QuotaRefreshService::new(repo.clone(), client.clone())
    }

    fn success(payload: serde_json::Value) -> FetchResult {
        FetchResult::without_rotations(QuotaOutcome::success(payload))
    }

    fn auth_failure_with(rotations: Vec<RotationDirective>) -> FetchResult {
        FetchResult::new(
            QuotaFailure::new(FailureKind::Auth, "expired")
                .with_status(401)
                .into(),
            rotations,
        )
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found_without_network() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let client = Arc::new(ScriptedClient::always(success(json!({}))));

        let outcome = service(&repo, &client).refresh("missing").await.unwrap();

        assert_eq!(outcome.failure_kind(), Some(FailureKind::NotFound));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_success_writes_snapshot() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let account = repo.insert("main", VALID_SESSION);
        let client = Arc::new(ScriptedClient::always(success(json!({"remaining": 42}))));

        let outcome = service(&repo, &client).refresh(&account.id).await.unwrap();

        assert!(outcome.is_success());
        let stored: QuotaOutcome =
            serde_json::from_str(repo.row(&account.id).unwrap().snapshot.as_deref().unwrap())
                .unwrap();
        assert_eq!(stored, outcome);
        assert_eq!(
            client.calls.lock().unwrap()[0].as_deref(),
            Some(VALID_SESSION)
        );
        assert!(repo.session_writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_persists_rotation_and_keeps_snapshot() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let previous = serde_json::to_string(&QuotaOutcome::success(json!({"old": true}))).unwrap();
        let account = repo.insert_with_snapshot("main", VALID_SESSION, &previous);
        let client = Arc::new(ScriptedClient::always(auth_failure_with(vec![
            RotationDirective::new("csrf_token", "tok2"),
        ])));

        let outcome = service(&repo, &client).refresh(&account.id).await.unwrap();

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Auth));
        let row = repo.row(&account.id).unwrap();
        assert_eq!(
            row.session,
            "csrf_session=s1; csrf_token=tok2; t=100; m_session_id=m1"
        );
        assert_eq!(row.snapshot.as_deref(), Some(previous.as_str()));
        assert!(repo.snapshot_writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_write_failure_does_not_mask_outcome() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let account = repo.insert("main", VALID_SESSION);
        repo.fail_session_writes_for(&account.id);
        let client = Arc::new(ScriptedClient::always(FetchResult::new(
            QuotaOutcome::success(json!({"remaining": 1})),
            vec![RotationDirective::new("t", "200")],
        )));

        let outcome = service(&repo, &client).refresh(&account.id).await.unwrap();

        assert!(outcome.is_success());
        let row = repo.row(&account.id).unwrap();
        assert_eq!(row.session, VALID_SESSION);
        assert!(row.snapshot.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_write_failure_is_an_error() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let account = repo.insert("main", VALID_SESSION);
        repo.fail_snapshot_writes_for(&account.id);
        let client = Arc::new(ScriptedClient::always(success(json!({}))));

        let result = service(&repo, &client).refresh(&account.id).await;
        assert!(matches!(result, Err(Error::DatabaseSqlx(_))));
    }

    #[tokio::test]
    async fn test_failure_tracker_follows_outcomes() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let account = repo.insert("main", VALID_SESSION);
        let client = Arc::new(
            ScriptedClient::always(success(json!({})))
                .then(auth_failure_with(vec![]))
                .then(auth_failure_with(vec![])),
        );
        let service = service(&repo, &client);
        let tracker = service.failure_tracker();

        service.refresh(&account.id).await.unwrap();
        service.refresh(&account.id).await.unwrap();
        assert_eq!(tracker.failure_count(&account.id), 2);

        service.refresh(&account.id).await.unwrap();
        assert_eq!(tracker.failure_count(&account.id), 0);
    }

    #[tokio::test]
    async fn test_create_account_rejects_bad_format_without_network() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let client = Arc::new(ScriptedClient::always(success(json!({}))));

        let err = service(&repo, &client)
            .create_account("main", "csrf_session=a; m_session_id=b")
            .await
            .unwrap_err();

        match err {
            Error::Validation(msg) => assert!(msg.contains("csrf_token, t")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.call_count(), 0);
        assert!(service(&repo, &client).list_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_account_rejects_unusable_session() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let client = Arc::new(ScriptedClient::always(auth_failure_with(vec![])));

        let err = service(&repo, &client)
            .create_account("main", VALID_SESSION)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SessionRejected(ref f) if f.kind == FailureKind::Auth));
        assert!(repo.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_account_uses_test_call_as_first_refresh() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let client = Arc::new(ScriptedClient::always(FetchResult::new(
            QuotaOutcome::success(json!({"remaining": 5})),
            vec![RotationDirective::new("t", "101")],
        )));

        let account = service(&repo, &client)
            .create_account("  main  ", VALID_SESSION)
            .await
            .unwrap();

        assert_eq!(client.call_count(), 1);
        assert_eq!(account.name, "main");
        assert_eq!(
            account.session,
            "csrf_session=s1; csrf_token=tok1; t=101; m_session_id=m1"
        );
        assert!(account.snapshot.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_create_account_survives_snapshot_write_failure() {
        let repo = Arc::new(MemoryAccountRepository::default());
        repo.fail_all_snapshot_writes();
        let client = Arc::new(ScriptedClient::always(success(json!({"remaining": 5}))));
        let service = service(&repo, &client);

        let account = service.create_account("main", VALID_SESSION).await.unwrap();

        assert!(account.snapshot.is_none());
        assert_eq!(account.session, VALID_SESSION);
        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, account.id);
    }

    #[tokio::test]
    async fn test_update_session_survives_snapshot_write_failure() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let existing = repo.insert("main", "csrf_session=old");
        repo.fail_all_snapshot_writes();
        let client = Arc::new(ScriptedClient::always(success(json!({"remaining": 2}))));

        let account = service(&repo, &client)
            .update_session(&existing.id, VALID_SESSION)
            .await
            .unwrap();

        assert_eq!(account.session, VALID_SESSION);
        assert!(account.snapshot.is_none());
    }

    #[tokio::test]
    async fn test_create_account_requires_name() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let client = Arc::new(ScriptedClient::always(success(json!({}))));

        let err = service(&repo, &client)
            .create_account("  ", VALID_SESSION)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_session_replaces_session_and_snapshot() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let account = repo.insert("main", VALID_SESSION);
        let client = Arc::new(ScriptedClient::always(success(json!({"remaining": 9}))));
        let new_session = "csrf_session=s9; csrf_token=tok9; t=900; m_session_id=m9";

        let updated = service(&repo, &client)
            .update_session(&account.id, new_session)
            .await
            .unwrap();

        assert_eq!(updated.session, new_session);
        assert!(updated.snapshot.is_some());
        assert_eq!(
            client.calls.lock().unwrap()[0].as_deref(),
            Some(new_session)
        );
    }

    #[tokio::test]
    async fn test_update_session_unknown_account() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let client = Arc::new(ScriptedClient::always(success(json!({}))));

        let err = service(&repo, &client)
            .update_session("missing", VALID_SESSION)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_session_rejected_keeps_old_session() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let account = repo.insert("main", VALID_SESSION);
        let client = Arc::new(ScriptedClient::always(auth_failure_with(vec![])));

        let err = service(&repo, &client)
            .update_session(&account.id, "csrf_session=x; csrf_token=y; t=z; m_session_id=w")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SessionRejected(_)));
        assert_eq!(repo.row(&account.id).unwrap().session, VALID_SESSION);
    }

    #[tokio::test]
    async fn test_deleted_account_is_invisible() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let account = repo.insert("main", VALID_SESSION);
        let client = Arc::new(ScriptedClient::always(success(json!({}))));
        let service = service(&repo, &client);

        service.delete_account(&account.id).await.unwrap();

        assert!(service.list_accounts().await.unwrap().is_empty());
        let outcome = service.refresh(&account.id).await.unwrap();
        assert_eq!(outcome.failure_kind(), Some(FailureKind::NotFound));
        assert!(matches!(
            service.delete_account(&account.id).await,
            Err(Error::NotFound { .. })
        ));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_latest_snapshot() {
        let repo = Arc::new(MemoryAccountRepository::default());
        let account = repo.insert("main", VALID_SESSION);
        let client = Arc::new(ScriptedClient::always(success(json!({"remaining": 3}))));
        let service = service(&repo, &client);

        assert_eq!(service.latest_snapshot(&account.id).await.unwrap(), None);
        assert!(matches!(
            service.latest_snapshot("missing").await,
            Err(Error::NotFound { .. })
        ));

        service.refresh(&account.id).await.unwrap();
        let snapshot = service.latest_snapshot(&account.id).await.unwrap().unwrap();
        assert!(snapshot.is_success());
        assert_eq!(service.stats().await.unwrap().accounts_with_snapshot, 1);
    }
}
