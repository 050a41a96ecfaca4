//! Candle (Kline) value type.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{Asset, Timestamp};

use super::Timeframe;

/// An immutable OHLCV candle.
///
/// Timestamps are monotonically increasing within a given (symbol,
/// timeframe) series. The system treats `close` as the matching price for
/// every order kind; open/high/low are carried but never used for fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// The traded pair this candle is for (e.g. `BTCUSDT`).
    symbol: Asset,
    /// Candle timeframe.
    timeframe: Timeframe,
    /// Candle open time.
    timestamp: Timestamp,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price. This is the only field the matching engine reads for
    /// fills.
    pub close: Decimal,
    /// Traded volume.
    pub volume: Decimal,
}

impl Candle {
    /// Construct a candle.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Asset,
        timeframe: Timeframe,
        timestamp: Timestamp,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            symbol,
            timeframe,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// The traded pair this candle belongs to.
    #[must_use]
    pub fn symbol(&self) -> &Asset {
        &self.symbol
    }

    /// The candle's timeframe.
    #[must_use]
    pub const fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// The candle's open time.
    #[must_use]
    pub const fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}
