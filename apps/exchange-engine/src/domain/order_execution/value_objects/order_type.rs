//! Order type (market, limit, stop-limit, or one-cancels-other).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order type specifying execution behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Market order - realized at the next candle's close.
    Market,
    /// Limit order - fills once the close crosses `execution_price`.
    Limit,
    /// Stop-limit order - becomes a limit order once `stop_price` is crossed.
    StopLimit,
    /// One-cancels-other - a linked limit and stop-limit leg.
    Oco,
}

impl OrderType {
    /// Returns true if this order type carries an `execution_price`.
    #[must_use]
    pub const fn requires_execution_price(&self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit)
    }

    /// Returns true if this order type carries a `stop_price`.
    #[must_use]
    pub const fn requires_stop_price(&self) -> bool {
        matches!(self, Self::StopLimit)
    }

    /// Returns true if this is a market order (realized on the next tick).
    #[must_use]
    pub const fn is_market(&self) -> bool {
        matches!(self, Self::Market)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "MARKET"),
            Self::Limit => write!(f, "LIMIT"),
            Self::StopLimit => write!(f, "STOP_LIMIT"),
            Self::Oco => write!(f, "OCO"),
        }
    }
}
