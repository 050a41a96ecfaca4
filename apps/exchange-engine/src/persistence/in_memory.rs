//! In-memory `UserStore`/`SnapshotStore`, used by default and by tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ExchangeSnapshot, PersistenceError, SnapshotStore, UserStore};
use crate::domain::shared::{ApiKey, UserId};
use crate::domain::user::User;

/// An in-memory [`UserStore`].
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    by_id: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: &User) -> Result<(), PersistenceError> {
        self.by_id.write().await.insert(user.id().clone(), user.clone());
        Ok(())
    }

    async fn find_by_api_key(&self, api_key: &ApiKey) -> Result<Option<User>, PersistenceError> {
        let by_id = self.by_id.read().await;
        Ok(by_id.values().find(|u| u.api_key() == api_key).cloned())
    }
}

/// An in-memory [`SnapshotStore`].
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<UserId, ExchangeSnapshot>>,
}

impl InMemorySnapshotStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self, user: &UserId) -> Option<ExchangeSnapshot> {
        self.snapshots.read().await.get(user).cloned()
    }

    async fn save(&self, snapshot: &ExchangeSnapshot) -> Result<(), PersistenceError> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.user_id.clone(), snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn user_store_resolves_by_api_key() {
        let store = InMemoryUserStore::new();
        let user = User::mint();
        store.insert(&user).await.expect("insert should succeed");

        let found = store
            .find_by_api_key(user.api_key())
            .await
            .expect("lookup should succeed");
        assert_eq!(found.map(|u| u.id().clone()), Some(user.id().clone()));
    }

    #[tokio::test]
    async fn user_store_unknown_key_returns_none() {
        let store = InMemoryUserStore::new();
        let found = store
            .find_by_api_key(&ApiKey::generate())
            .await
            .expect("lookup should succeed");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn snapshot_store_roundtrips_the_latest_save() {
        let store = InMemorySnapshotStore::new();
        let user = UserId::new("user-1");
        let snapshot = ExchangeSnapshot {
            user_id: user.clone(),
            last_used: crate::domain::shared::Timestamp::now(),
            multiplier: 2.0,
            commission: rust_decimal_macros::dec!(0.002),
        };

        store.save(&snapshot).await.expect("save should succeed");
        let loaded = store.load(&user).await;
        assert_eq!(loaded, Some(snapshot));
    }
}
