//! Asset ticker value object (e.g. `BTC`, `USDT`).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// An asset ticker, always stored upper-cased.
///
/// Used for both the base asset (what is being traded) and the target
/// asset (what it is priced in) of an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asset(String);

impl Asset {
    /// Create an asset ticker, upper-casing the input.
    #[must_use]
    pub fn new(ticker: impl AsRef<str>) -> Self {
        Self(ticker.as_ref().to_ascii_uppercase())
    }

    /// Get the ticker as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that the ticker is non-empty and alphanumeric.
    ///
    /// # Errors
    ///
    /// Returns error if the ticker is empty or contains characters other
    /// than ASCII letters and digits.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            return Err(DomainError::InvalidValue {
                field: "asset".to_string(),
                message: "asset ticker cannot be empty".to_string(),
            });
        }
        if !self.0.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::InvalidValue {
                field: "asset".to_string(),
                message: format!("asset ticker '{}' is not alphanumeric", self.0),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Asset {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Asset {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Asset {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_upper_cases_input() {
        let a = Asset::new("btc");
        assert_eq!(a.as_str(), "BTC");
        assert_eq!(format!("{a}"), "BTC");
    }

    #[test]
    fn asset_equality_is_case_normalized() {
        assert_eq!(Asset::new("usdt"), Asset::new("USDT"));
    }

    #[test]
    fn asset_validate_rejects_empty() {
        assert!(Asset::new("").validate().is_err());
    }

    #[test]
    fn asset_validate_rejects_non_alphanumeric() {
        assert!(Asset::new("BTC-USD").validate().is_err());
    }

    #[test]
    fn asset_validate_accepts_ticker() {
        assert!(Asset::new("ETH").validate().is_ok());
    }

    #[test]
    fn asset_from_conversions() {
        let a: Asset = "sol".into();
        assert_eq!(a, Asset::new("SOL"));

        let b: Asset = String::from("ada").into();
        assert_eq!(b, Asset::new("ADA"));
    }

    #[test]
    fn asset_serde_roundtrip() {
        let a = Asset::new("BTC");
        let json = match serde_json::to_string(&a) {
            Ok(j) => j,
            Err(e) => panic!("should serialize asset: {e}"),
        };
        assert_eq!(json, "\"BTC\"");
        let parsed: Asset = match serde_json::from_str(&json) {
            Ok(p) => p,
            Err(e) => panic!("should deserialize asset: {e}"),
        };
        assert_eq!(parsed, a);
    }
}
