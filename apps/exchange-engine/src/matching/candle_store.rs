//! Candle Store (C1)
//!
//! A read-only, deterministic source of OHLCV candles. Lookup failures are
//! *data-absent*, not fatal: the matching engine treats a missing candle as
//! "keep the last known one and skip this tick" rather than propagating an
//! error up to the caller.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::shared::{Asset, DomainError, Timestamp};

/// Read access to pre-populated candle history for one (symbol, timeframe)
/// series.
///
/// Implementations must be side-effect-free: the same arguments always
/// return the same candle.
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// The candle whose timestamp equals `ts` exactly, if any.
    async fn get_by_time(&self, symbol: &Asset, timeframe: Timeframe, ts: Timestamp) -> Option<Candle>;

    /// The most recent `n` candles, descending by time.
    async fn latest(&self, symbol: &Asset, timeframe: Timeframe, n: usize) -> Vec<Candle>;

    /// The most recent `n` candles strictly before `ts`, descending by time.
    async fn latest_before(
        &self,
        symbol: &Asset,
        timeframe: Timeframe,
        ts: Timestamp,
        n: usize,
    ) -> Vec<Candle>;

    /// The timestamp of the most recent candle in a series, if any. Used to
    /// seek the simulated clock to the start of a replay window (§4.4).
    async fn last_timestamp(&self, symbol: &Asset, timeframe: Timeframe) -> Option<Timestamp>;
}

/// An in-memory candle store backed by a sorted map per (symbol, timeframe).
///
/// The default store for tests and for any deployment that ingests candle
/// CSVs into memory rather than a durable table.
#[derive(Debug, Default)]
pub struct InMemoryCandleStore {
    series: RwLock<BTreeMap<(Asset, Timeframe), BTreeMap<Timestamp, Candle>>>,
}

impl InMemoryCandleStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candle, keyed by its own symbol/timeframe/timestamp.
    pub fn insert(&self, candle: Candle) {
        let key = (candle.symbol().clone(), candle.timeframe());
        let mut series = self.series.write().unwrap_or_else(|e| e.into_inner());
        series
            .entry(key)
            .or_default()
            .insert(candle.timestamp(), candle);
    }

    /// The timestamp of the most recent candle in a series, if any.
    ///
    /// Sync inherent convenience; the async [`CandleStore::last_timestamp`]
    /// trait method (used by the matching engine's clock seek) reads the
    /// same map.
    #[must_use]
    pub fn last_timestamp(&self, symbol: &Asset, timeframe: Timeframe) -> Option<Timestamp> {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        series
            .get(&(symbol.clone(), timeframe))
            .and_then(|bars| bars.keys().next_back().copied())
    }

    /// Ingest a `Date,Open,High,Low,Close,Volume` CSV (§6), one candle per
    /// row, `Date` as `YYYY-MM-DD`. Returns the number of rows ingested.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidValue`] on the first malformed row; no
    /// partial ingestion — rows already inserted from this call are not
    /// rolled back, so callers should ingest into a fresh store or one they
    /// are prepared to see partially populated on error.
    pub fn load_csv(
        &self,
        symbol: &Asset,
        timeframe: Timeframe,
        csv: &str,
    ) -> Result<usize, DomainError> {
        let mut count = 0;
        for (line_no, line) in csv.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("Date,") {
                continue;
            }
            let candle = parse_csv_row(symbol, timeframe, line).map_err(|message| {
                DomainError::InvalidValue {
                    field: format!("csv row {}", line_no + 1),
                    message,
                }
            })?;
            self.insert(candle);
            count += 1;
        }
        Ok(count)
    }
}

fn parse_csv_row(symbol: &Asset, timeframe: Timeframe, line: &str) -> Result<Candle, String> {
    let fields: Vec<&str> = line.split(',').collect();
    let [date, open, high, low, close, volume] = fields.as_slice() else {
        return Err(format!("expected 6 columns, got {}", fields.len()));
    };

    let date = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| format!("bad date {date:?}: {e}"))?;
    let timestamp = Timestamp::new(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());

    let parse_decimal = |field: &str, name: &str| {
        field
            .parse::<Decimal>()
            .map_err(|e| format!("bad {name} {field:?}: {e}"))
    };

    Ok(Candle::new(
        symbol.clone(),
        timeframe,
        timestamp,
        parse_decimal(open, "open")?,
        parse_decimal(high, "high")?,
        parse_decimal(low, "low")?,
        parse_decimal(close, "close")?,
        parse_decimal(volume, "volume")?,
    ))
}

#[async_trait]
impl CandleStore for InMemoryCandleStore {
    async fn get_by_time(&self, symbol: &Asset, timeframe: Timeframe, ts: Timestamp) -> Option<Candle> {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        series.get(&(symbol.clone(), timeframe))?.get(&ts).cloned()
    }

    async fn latest(&self, symbol: &Asset, timeframe: Timeframe, n: usize) -> Vec<Candle> {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        let Some(bars) = series.get(&(symbol.clone(), timeframe)) else {
            return Vec::new();
        };
        bars.values().rev().take(n).cloned().collect()
    }

    async fn latest_before(
        &self,
        symbol: &Asset,
        timeframe: Timeframe,
        ts: Timestamp,
        n: usize,
    ) -> Vec<Candle> {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        let Some(bars) = series.get(&(symbol.clone(), timeframe)) else {
            return Vec::new();
        };
        bars.range(..ts).rev().take(n).map(|(_, c)| c.clone()).collect()
    }

    async fn last_timestamp(&self, symbol: &Asset, timeframe: Timeframe) -> Option<Timestamp> {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        series
            .get(&(symbol.clone(), timeframe))
            .and_then(|bars| bars.keys().next_back().copied())
    }
}
