//! Turso-backed [`UserStore`]/[`SnapshotStore`], durable across restarts.
//!
//! Two tables only, per the module-level scope note: `users` (identity plus
//! API key) and `exchange_instances` (the little bit of engine state a
//! `start` needs to rehydrate). Balances and open orders never touch disk.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;
use turso::{Builder, Database, Error as TursoError, Row, Value};

use super::{ExchangeSnapshot, PersistenceError, SnapshotStore, UserStore};
use crate::domain::shared::{ApiKey, Timestamp, UserId};
use crate::domain::user::User;

impl From<TursoError> for PersistenceError {
    fn from(err: TursoError) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Durable store backed by a local Turso database file.
pub struct TursoStore {
    db: Database,
}

impl TursoStore {
    /// Open (creating if absent) the database at `path` and run migrations.
    pub async fn open(path: &str) -> Result<Self, PersistenceError> {
        let db = Builder::new_local(path).build().await?;
        Self::migrate(&db).await?;
        Ok(Self { db })
    }

    /// Open an ephemeral in-memory database, for tests.
    pub async fn open_in_memory() -> Result<Self, PersistenceError> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::migrate(&db).await?;
        Ok(Self { db })
    }

    async fn migrate(db: &Database) -> Result<(), PersistenceError> {
        let conn = db.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                api_key TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_api_key ON users(api_key);

            CREATE TABLE IF NOT EXISTS exchange_instances (
                user_id TEXT PRIMARY KEY,
                last_used_timestamp TEXT NOT NULL,
                multiplier REAL NOT NULL,
                commission TEXT NOT NULL
            );",
        )
        .await
        .map_err(|e| PersistenceError::Backend(e.to_string()))?;

        debug!("persistence migrations complete");
        Ok(())
    }

    fn row_to_user(row: &Row) -> Result<User, PersistenceError> {
        let id: String = row
            .get(0)
            .map_err(|e| PersistenceError::Decode(format!("id: {e}")))?;
        let api_key: String = row
            .get(1)
            .map_err(|e| PersistenceError::Decode(format!("api_key: {e}")))?;
        let created_at: String = row
            .get(2)
            .map_err(|e| PersistenceError::Decode(format!("created_at: {e}")))?;
        let created_at = created_at
            .parse::<chrono::DateTime<chrono::Utc>>()
            .map_err(|e| PersistenceError::Decode(format!("created_at: {e}")))?;

        Ok(User::reconstitute(
            UserId::new(id),
            ApiKey::new(api_key),
            Timestamp::new(created_at),
        ))
    }
}

#[async_trait]
impl UserStore for TursoStore {
    async fn insert(&self, user: &User) -> Result<(), PersistenceError> {
        let conn = self.db.connect()?;
        let params: Vec<Value> = vec![
            Value::Text(user.id().as_str().to_string()),
            Value::Text(user.api_key().as_str().to_string()),
            Value::Text(user.created_at().to_rfc3339()),
        ];

        conn.execute(
            "INSERT OR REPLACE INTO users (id, api_key, created_at) VALUES (?, ?, ?)",
            params,
        )
        .await
        .map_err(|e| PersistenceError::Backend(e.to_string()))?;

        debug!(user_id = %user.id(), "user persisted");
        Ok(())
    }

    async fn find_by_api_key(&self, api_key: &ApiKey) -> Result<Option<User>, PersistenceError> {
        let conn = self.db.connect()?;
        let params: Vec<Value> = vec![Value::Text(api_key.as_str().to_string())];

        let mut rows = conn
            .query(
                "SELECT id, api_key, created_at FROM users WHERE api_key = ?",
                params,
            )
            .await
            .map_err(|e| PersistenceError::Backend(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| PersistenceError::Backend(e.to_string()))?
        {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SnapshotStore for TursoStore {
    async fn load(&self, user: &UserId) -> Option<ExchangeSnapshot> {
        let conn = self.db.connect().ok()?;
        let params: Vec<Value> = vec![Value::Text(user.as_str().to_string())];

        let mut rows = conn
            .query(
                "SELECT user_id, last_used_timestamp, multiplier, commission
                 FROM exchange_instances WHERE user_id = ?",
                params,
            )
            .await
            .ok()?;

        let row = rows.next().await.ok().flatten()?;

        let last_used: String = row.get(1).ok()?;
        let last_used = last_used.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
        let multiplier: f64 = row.get(2).ok()?;
        let commission: String = row.get(3).ok()?;
        let commission = Decimal::from_str(&commission).ok()?;

        Some(ExchangeSnapshot {
            user_id: user.clone(),
            last_used: Timestamp::new(last_used),
            multiplier,
            commission,
        })
    }

    async fn save(&self, snapshot: &ExchangeSnapshot) -> Result<(), PersistenceError> {
        let conn = self.db.connect()?;
        let params: Vec<Value> = vec![
            Value::Text(snapshot.user_id.as_str().to_string()),
            Value::Text(snapshot.last_used.to_rfc3339()),
            Value::Real(snapshot.multiplier),
            Value::Text(snapshot.commission.to_string()),
        ];

        conn.execute(
            "INSERT OR REPLACE INTO exchange_instances (
                user_id, last_used_timestamp, multiplier, commission
            ) VALUES (?, ?, ?, ?)",
            params,
        )
        .await
        .map_err(|e| PersistenceError::Backend(e.to_string()))?;

        debug!(user_id = %snapshot.user_id, "exchange snapshot persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn user_roundtrips_through_the_database() {
        let store = match TursoStore::open_in_memory().await {
            Ok(s) => s,
            Err(e) => panic!("should open in-memory database: {e}"),
        };
        let user = User::mint();
        store.insert(&user).await.expect("insert should succeed");

        let found = store
            .find_by_api_key(user.api_key())
            .await
            .expect("lookup should succeed");
        assert_eq!(found.map(|u| u.id().clone()), Some(user.id().clone()));
    }

    #[tokio::test]
    async fn snapshot_roundtrips_through_the_database() {
        let store = match TursoStore::open_in_memory().await {
            Ok(s) => s,
            Err(e) => panic!("should open in-memory database: {e}"),
        };
        let user = UserId::new("user-1");
        let snapshot = ExchangeSnapshot {
            user_id: user.clone(),
            last_used: Timestamp::now(),
            multiplier: 2.5,
            commission: dec!(0.0015),
        };

        store.save(&snapshot).await.expect("save should succeed");
        let loaded = store.load(&user).await.expect("snapshot should be found");
        assert_eq!(loaded.multiplier, snapshot.multiplier);
        assert_eq!(loaded.commission, snapshot.commission);
    }

    #[tokio::test]
    async fn missing_snapshot_returns_none() {
        let store = match TursoStore::open_in_memory().await {
            Ok(s) => s,
            Err(e) => panic!("should open in-memory database: {e}"),
        };
        assert!(store.load(&UserId::new("ghost")).await.is_none());
    }
}
