//! The persisted slice of engine state: everything needed to rehydrate an
//! engine after it has been stopped or idle-evicted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{Timestamp, UserId};

/// `(user_id, last_used_timestamp, multiplier, commission)` — the
/// `exchange_instances` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSnapshot {
    /// The user this snapshot belongs to.
    pub user_id: UserId,
    /// Wall-clock time of the engine's last activity before it stopped.
    pub last_used: Timestamp,
    /// Wall-time speedup factor to restore on the next `start`.
    pub multiplier: f64,
    /// Commission rate to restore on the next `start`.
    pub commission: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn snapshot_serde_roundtrip() {
        let snapshot = ExchangeSnapshot {
            user_id: UserId::new("user-1"),
            last_used: Timestamp::now(),
            multiplier: 2.0,
            commission: dec!(0.001),
        };
        let json = match serde_json::to_string(&snapshot) {
            Ok(j) => j,
            Err(e) => panic!("should serialize snapshot: {e}"),
        };
        let parsed: ExchangeSnapshot = match serde_json::from_str(&json) {
            Ok(p) => p,
            Err(e) => panic!("should deserialize snapshot: {e}"),
        };
        assert_eq!(parsed, snapshot);
    }
}
