//! User account: identity plus the API key that authenticates it.

use serde::{Deserialize, Serialize};

use crate::domain::shared::{ApiKey, Timestamp, UserId};

/// A user account.
///
/// Created once at API-key mint and never destroyed. Balance state lives
/// in the balance ledger, keyed by [`UserId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    api_key: ApiKey,
    created_at: Timestamp,
}

impl User {
    /// Mint a new user with a freshly generated id and API key.
    #[must_use]
    pub fn mint() -> Self {
        Self {
            id: UserId::generate(),
            api_key: ApiKey::generate(),
            created_at: Timestamp::now(),
        }
    }

    /// Reconstruct a user from stored fields.
    #[must_use]
    pub const fn reconstitute(id: UserId, api_key: ApiKey, created_at: Timestamp) -> Self {
        Self {
            id,
            api_key,
            created_at,
        }
    }

    /// The user's id.
    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// The user's API key.
    #[must_use]
    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// When the user was minted.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }
}
