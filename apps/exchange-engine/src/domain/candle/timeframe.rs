//! Candle timeframe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Candle aggregation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// One hour.
    #[serde(rename = "1h")]
    OneHour,
    /// Four hours.
    #[serde(rename = "4h")]
    FourHour,
    /// One day.
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    /// Duration of one candle in this timeframe, in seconds.
    #[must_use]
    pub const fn duration_secs(&self) -> i64 {
        match self {
            Self::OneHour => 3_600,
            Self::FourHour => 4 * 3_600,
            Self::OneDay => 24 * 3_600,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneHour => write!(f, "1h"),
            Self::FourHour => write!(f, "4h"),
            Self::OneDay => write!(f, "1d"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_secs_matches_label() {
        assert_eq!(Timeframe::OneHour.duration_secs(), 3_600);
        assert_eq!(Timeframe::FourHour.duration_secs(), 14_400);
        assert_eq!(Timeframe::OneDay.duration_secs(), 86_400);
    }

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(format!("{}", Timeframe::OneHour), "1h");
        assert_eq!(format!("{}", Timeframe::FourHour), "4h");
        assert_eq!(format!("{}", Timeframe::OneDay), "1d");
    }

    #[test]
    fn serde_roundtrip() {
        let json = match serde_json::to_string(&Timeframe::FourHour) {
            Ok(j) => j,
            Err(e) => panic!("should serialize timeframe: {e}"),
        };
        assert_eq!(json, "\"4h\"");
        let parsed: Timeframe = match serde_json::from_str(&json) {
            Ok(p) => p,
            Err(e) => panic!("should deserialize timeframe: {e}"),
        };
        assert_eq!(parsed, Timeframe::FourHour);
    }
}
