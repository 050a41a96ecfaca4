//! Candle (Kline) Bounded Context
//!
//! Candles are immutable, pre-populated, and read-only: this context
//! defines the value type and timeframe enum only. Storage lives in
//! [`crate::persistence`].

mod kline;
mod timeframe;

pub use kline::Candle;
pub use timeframe::Timeframe;
