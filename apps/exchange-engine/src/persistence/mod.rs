//! Durable state: user identities and engine snapshots.
//!
//! Balances, open orders, and simulated-clock state are deliberately *not*
//! persisted here — the spec calls these out as engine runtime state that
//! lives only as long as the engine does. What must survive a process
//! restart is account identity (`users`) and the little bit of state a
//! `start` needs to rehydrate an engine (`exchange_instances`).

mod in_memory;
mod snapshot;
mod turso_store;

pub use in_memory::{InMemorySnapshotStore, InMemoryUserStore};
pub use snapshot::ExchangeSnapshot;
pub use turso_store::TursoStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::shared::{ApiKey, UserId};
use crate::domain::user::User;

/// Errors from the durable store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The backing database could not be reached or queried.
    #[error("persistence backend error: {0}")]
    Backend(String),
    /// A stored row could not be decoded back into a domain type.
    #[error("corrupt stored row: {0}")]
    Decode(String),
}

/// Durable storage of user identities and their API keys.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a freshly minted user.
    async fn insert(&self, user: &User) -> Result<(), PersistenceError>;

    /// Resolve a bearer API key to the user it was minted for.
    async fn find_by_api_key(&self, api_key: &ApiKey) -> Result<Option<User>, PersistenceError>;
}

/// Durable storage of `(user_id, last_used_timestamp, multiplier,
/// commission)` snapshots, written on `stop` and read on the next `start`.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the most recently saved snapshot for `user`, if any.
    async fn load(&self, user: &UserId) -> Option<ExchangeSnapshot>;

    /// Upsert the snapshot for `snapshot.user_id`.
    async fn save(&self, snapshot: &ExchangeSnapshot) -> Result<(), PersistenceError>;
}
