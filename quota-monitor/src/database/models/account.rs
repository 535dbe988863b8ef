//! Account database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of the `accounts` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct AccountDbModel {
    /// Unique identifier (UUID)
    pub id: String,
    /// Operator-chosen display name
    pub name: String,
    /// Raw `Cookie` header used to authenticate against the quota API
    pub session: String,
    /// JSON text of the latest quota snapshot, if any
    pub snapshot: Option<String>,
    /// Soft-delete marker
    pub is_active: bool,
    /// Unix epoch milliseconds (UTC).
    pub created_at: i64,
    /// Unix epoch milliseconds (UTC).
    pub updated_at: i64,
}

impl AccountDbModel {
    /// New active account with a fresh id and no snapshot.
    pub fn new(name: impl Into<String>, session: impl Into<String>) -> Self {
        let now = crate::database::time::now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            session: session.into(),
            snapshot: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account() {
        let model = AccountDbModel::new("main", "a=1");
        assert!(model.is_active);
        assert!(model.snapshot.is_none());
        assert_eq!(model.created_at, model.updated_at);
        assert!(uuid::Uuid::parse_str(&model.id).is_ok());
    }
}
