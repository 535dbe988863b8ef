//! In-memory doubles for the account store and the quota client.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::client::QuotaClient;
use super::types::FetchResult;
use crate::database::models::AccountDbModel;
use crate::database::repositories::AccountRepository;
use crate::domain::AccountStats;
use crate::{Error, Result};

pub(crate) const VALID_SESSION: &str = "csrf_session=s1; csrf_token=tok1; t=100; m_session_id=m1";

#[derive(Default)]
pub(crate) struct MemoryAccountRepository {
    accounts: Mutex<Vec<AccountDbModel>>,
    failing_snapshot_writes: Mutex<HashSet<String>>,
    snapshot_store_down: AtomicBool,
    failing_session_writes: Mutex<HashSet<String>>,
    pub session_writes: Mutex<Vec<(String, String)>>,
    pub snapshot_writes: Mutex<Vec<(String, String)>>,
}

impl MemoryAccountRepository {
    pub fn insert(&self, name: &str, session: &str) -> AccountDbModel {
        let model = AccountDbModel::new(name, session);
        self.accounts.lock().unwrap().push(model.clone());
        model
    }

    pub fn insert_with_snapshot(&self, name: &str, session: &str, snapshot: &str) -> AccountDbModel {
        let mut model = AccountDbModel::new(name, session);
        model.snapshot = Some(snapshot.to_string());
        self.accounts.lock().unwrap().push(model.clone());
        model
    }

    pub fn row(&self, id: &str) -> Option<AccountDbModel> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn fail_snapshot_writes_for(&self, id: &str) {
        self.failing_snapshot_writes
            .lock()
            .unwrap()
            .insert(id.to_string());
    }

    /// Every snapshot write fails, including for accounts created later.
    pub fn fail_all_snapshot_writes(&self) {
        self.snapshot_store_down.store(true, Ordering::SeqCst);
    }

    pub fn fail_session_writes_for(&self, id: &str) {
        self.failing_session_writes
            .lock()
            .unwrap()
            .insert(id.to_string());
    }

    fn with_active<T>(&self, id: &str, f: impl FnOnce(&mut AccountDbModel) -> T) -> Result<T> {
        let mut accounts = self.accounts.lock().unwrap();
        accounts
            .iter_mut()
            .find(|a| a.id == id && a.is_active)
            .map(f)
            .ok_or_else(|| Error::not_found("Account", id))
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn create(&self, name: &str, session: &str) -> Result<AccountDbModel> {
        Ok(self.insert(name, session))
    }

    async fn list_active(&self) -> Result<Vec<AccountDbModel>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.is_active)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<AccountDbModel>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id && a.is_active)
            .cloned())
    }

    async fn update_session(&self, id: &str, session: &str) -> Result<()> {
        if self.failing_session_writes.lock().unwrap().contains(id) {
            return Err(Error::DatabaseSqlx(sqlx::Error::PoolTimedOut));
        }
        self.with_active(id, |a| a.session = session.to_string())?;
        self.session_writes
            .lock()
            .unwrap()
            .push((id.to_string(), session.to_string()));
        Ok(())
    }

    async fn update_snapshot(&self, id: &str, snapshot: &str) -> Result<()> {
        if self.snapshot_store_down.load(Ordering::SeqCst)
            || self.failing_snapshot_writes.lock().unwrap().contains(id)
        {
            return Err(Error::DatabaseSqlx(sqlx::Error::PoolTimedOut));
        }
        self.with_active(id, |a| a.snapshot = Some(snapshot.to_string()))?;
        self.snapshot_writes
            .lock()
            .unwrap()
            .push((id.to_string(), snapshot.to_string()));
        Ok(())
    }

    async fn soft_delete(&self, id: &str) -> Result<()> {
        self.with_active(id, |a| a.is_active = false)
    }

    async fn stats(&self) -> Result<AccountStats> {
        let accounts = self.accounts.lock().unwrap();
        let active = accounts.iter().filter(|a| a.is_active);
        Ok(AccountStats {
            accounts: active.clone().count() as u64,
            accounts_with_snapshot: active.filter(|a| a.snapshot.is_some()).count() as u64,
        })
    }
}

/// Quota client replaying queued results, then a fixed fallback.
pub(crate) struct ScriptedClient {
    queued: Mutex<VecDeque<FetchResult>>,
    fallback: FetchResult,
    pub calls: Mutex<Vec<Option<String>>>,
}

impl ScriptedClient {
    pub fn always(result: FetchResult) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: result,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, result: FetchResult) -> Self {
        self.queued.lock().unwrap().push_back(result);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl QuotaClient for ScriptedClient {
    async fn fetch_quota(&self, session: Option<&str>) -> FetchResult {
        self.calls
            .lock()
            .unwrap()
            .push(session.map(str::to_string));
        self.queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
