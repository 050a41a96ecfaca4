//! Durable-store configuration.

use serde::{Deserialize, Serialize};

/// Durable-store configuration.
///
/// Backed by a local Turso database file rather than a connection string —
/// `users` and `exchange_instances` are the only tables (§6); there is no
/// connection pool to size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Enable durable persistence. When `false`, the manager uses
    /// in-memory stores that do not survive a restart.
    #[serde(default = "default_persistence_enabled")]
    pub enabled: bool,
    /// Path to the Turso database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_persistence_enabled(),
            database_path: default_database_path(),
        }
    }
}

const fn default_persistence_enabled() -> bool {
    true
}

fn default_database_path() -> String {
    "exchange.db".to_string()
}
