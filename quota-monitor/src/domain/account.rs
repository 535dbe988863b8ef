//! Monitored account entity.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::models::AccountDbModel;
use crate::database::time::ms_to_datetime;
use crate::quota::QuotaOutcome;

/// An account whose quota is polled with a stored browser session.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub name: String,
    /// Raw `Cookie` header. Never log it.
    pub session: String,
    /// Latest snapshot. A row whose stored snapshot no longer decodes is
    /// treated as having none.
    pub snapshot: Option<QuotaOutcome>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn from_db_model(model: AccountDbModel) -> Self {
        let snapshot = model.snapshot.as_deref().and_then(|raw| {
            serde_json::from_str::<QuotaOutcome>(raw)
                .inspect_err(|e| {
                    tracing::warn!(account_id = %model.id, error = %e, "Ignoring undecodable snapshot")
                })
                .ok()
        });

        Self {
            id: model.id,
            name: model.name,
            session: model.session,
            snapshot,
            is_active: model.is_active,
            created_at: ms_to_datetime(model.created_at),
            updated_at: ms_to_datetime(model.updated_at),
        }
    }
}

/// Counts over active accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccountStats {
    pub accounts: u64,
    pub accounts_with_snapshot: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_db_model_decodes_snapshot() {
        let mut model = AccountDbModel::new("main", "a=1");
        model.snapshot = Some(
            r#"{"success":true,"payload":{"remaining":10},"observed_at":"2026-01-01T00:00:00Z"}"#
                .to_string(),
        );

        let account = Account::from_db_model(model);
        let snapshot = account.snapshot.unwrap();
        assert!(snapshot.is_success());
    }

    #[test]
    fn test_from_db_model_ignores_garbage_snapshot() {
        let mut model = AccountDbModel::new("main", "a=1");
        model.snapshot = Some("not json".to_string());

        assert!(Account::from_db_model(model).snapshot.is_none());
    }
}
