// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Field names of a [`SignalRecord`] as seen by transformation scripts.
///
/// The order matches the declaration order of the struct and is the order
/// used when a record is handed to the sandbox as a dict.
pub const RECORD_FIELDS: [&str; 9] = [
    "ticker",
    "signal_type",
    "signal_strength",
    "confidence_score",
    "politician_activity_count",
    "buy_sell_ratio",
    "total_transaction_volume",
    "bipartisan",
    "features",
];

/// Short names pre-bound in every script namespace, each mirroring one
/// record field. A script may rebind them; see `sandbox::schema`.
pub const FIELD_ALIASES: [(&str, &str); 9] = [
    ("ticker", "ticker"),
    ("signal_type", "signal_type"),
    ("strength", "signal_strength"),
    ("confidence", "confidence_score"),
    ("activity", "politician_activity_count"),
    ("ratio", "buy_sell_ratio"),
    ("volume", "total_transaction_volume"),
    ("bipartisan", "bipartisan"),
    ("features", "features"),
];

/// Buy/sell/hold classification of a signal.
///
/// Variants are declared in ascending rank so the derived `Ord` gives
/// `StrongSell < Sell < Hold < Buy < StrongBuy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl SignalType {
    pub const ALL: [SignalType; 5] = [
        SignalType::StrongSell,
        SignalType::Sell,
        SignalType::Hold,
        SignalType::Buy,
        SignalType::StrongBuy,
    ];

    /// Ordinal rank, 0 for `StrongSell` up to 4 for `StrongBuy`.
    pub fn rank(self) -> i8 {
        match self {
            SignalType::StrongSell => 0,
            SignalType::Sell => 1,
            SignalType::Hold => 2,
            SignalType::Buy => 3,
            SignalType::StrongBuy => 4,
        }
    }

    /// Distance from `Hold`: 0 for hold, 1 for buy/sell, 2 for the strong variants.
    pub fn conviction(self) -> u8 {
        (self.rank() - SignalType::Hold.rank()).unsigned_abs()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::StrongSell => "strong_sell",
            SignalType::Sell => "sell",
            SignalType::Hold => "hold",
            SignalType::Buy => "buy",
            SignalType::StrongBuy => "strong_buy",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = RecordInvariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| RecordInvariantError::UnknownSignalType(s.to_string()))
    }
}

/// Qualitative strength label attached by the upstream scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthLabel {
    Low,
    Medium,
    High,
}

impl StrengthLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            StrengthLabel::Low => "low",
            StrengthLabel::Medium => "medium",
            StrengthLabel::High => "high",
        }
    }
}

impl FromStr for StrengthLabel {
    type Err = RecordInvariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(StrengthLabel::Low),
            "medium" => Ok(StrengthLabel::Medium),
            "high" => Ok(StrengthLabel::High),
            other => Err(RecordInvariantError::UnknownStrength(other.to_string())),
        }
    }
}

/// Signal strength is either a label or a raw score, depending on which
/// scoring path produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalStrength {
    Label(StrengthLabel),
    Score(f64),
}

/// One scored recommendation for a single ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub ticker: String,
    pub signal_type: SignalType,
    pub signal_strength: SignalStrength,
    pub confidence_score: f64,
    pub politician_activity_count: u64,
    pub buy_sell_ratio: f64,
    pub total_transaction_volume: f64,
    pub bipartisan: bool,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
}

/// A record field that violates the data model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordInvariantError {
    #[error("ticker must be a non-empty string")]
    EmptyTicker,
    #[error("confidence_score {0} is outside [0.0, 1.0]")]
    ConfidenceOutOfRange(f64),
    #[error("{field} must be a finite, non-negative number (got {value})")]
    NegativeOrNonFinite { field: &'static str, value: f64 },
    #[error("signal_strength score must be finite (got {0})")]
    NonFiniteStrength(f64),
    #[error("feature '{name}' must be finite (got {value})")]
    NonFiniteFeature { name: String, value: f64 },
    #[error("unknown signal_type '{0}'")]
    UnknownSignalType(String),
    #[error("unknown signal_strength label '{0}'")]
    UnknownStrength(String),
}

impl SignalRecord {
    /// Check every invariant of the data model.
    pub fn validate(&self) -> Result<(), RecordInvariantError> {
        if self.ticker.trim().is_empty() {
            return Err(RecordInvariantError::EmptyTicker);
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(RecordInvariantError::ConfidenceOutOfRange(self.confidence_score));
        }
        for (field, value) in [
            ("buy_sell_ratio", self.buy_sell_ratio),
            ("total_transaction_volume", self.total_transaction_volume),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RecordInvariantError::NegativeOrNonFinite { field, value });
            }
        }
        if let SignalStrength::Score(score) = self.signal_strength {
            if !score.is_finite() {
                return Err(RecordInvariantError::NonFiniteStrength(score));
            }
        }
        if let Some((name, value)) = self.features.iter().find(|(_, v)| !v.is_finite()) {
            return Err(RecordInvariantError::NonFiniteFeature {
                name: name.clone(),
                value: *value,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_record(ticker: &str) -> SignalRecord {
    SignalRecord {
        ticker: ticker.to_string(),
        signal_type: SignalType::Buy,
        signal_strength: SignalStrength::Label(StrengthLabel::Medium),
        confidence_score: 0.85,
        politician_activity_count: 7,
        buy_sell_ratio: 3.5,
        total_transaction_volume: 1_250_000.0,
        bipartisan: true,
        features: BTreeMap::from([("momentum".to_string(), 0.4)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_types_are_ordered_by_rank() {
        assert!(SignalType::StrongSell < SignalType::Sell);
        assert!(SignalType::Sell < SignalType::Hold);
        assert!(SignalType::Hold < SignalType::Buy);
        assert!(SignalType::Buy < SignalType::StrongBuy);
        assert_eq!(SignalType::StrongBuy.conviction(), 2);
        assert_eq!(SignalType::Sell.conviction(), 1);
        assert_eq!(SignalType::Hold.conviction(), 0);
    }

    #[test]
    fn signal_type_parses_snake_case() {
        assert_eq!("strong_buy".parse::<SignalType>().unwrap(), SignalType::StrongBuy);
        assert!("bullish".parse::<SignalType>().is_err());
    }

    #[test]
    fn record_deserializes_both_strength_shapes() {
        let json = r#"{
            "ticker": "NVDA", "signal_type": "buy", "signal_strength": "high",
            "confidence_score": 0.85, "politician_activity_count": 4,
            "buy_sell_ratio": 3.5, "total_transaction_volume": 1000.0,
            "bipartisan": false
        }"#;
        let record: SignalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.signal_strength, SignalStrength::Label(StrengthLabel::High));
        assert!(record.features.is_empty());

        let json = json.replace("\"high\"", "0.72");
        let record: SignalRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.signal_strength, SignalStrength::Score(0.72));
    }

    #[test]
    fn validate_rejects_out_of_range_confidence() {
        let mut record = sample_record("AAPL");
        assert!(record.validate().is_ok());
        record.confidence_score = 1.2;
        assert_eq!(
            record.validate(),
            Err(RecordInvariantError::ConfidenceOutOfRange(1.2))
        );
    }

    #[test]
    fn validate_rejects_empty_ticker_and_negative_ratio() {
        let mut record = sample_record(" ");
        assert_eq!(record.validate(), Err(RecordInvariantError::EmptyTicker));
        record.ticker = "MSFT".into();
        record.buy_sell_ratio = -1.0;
        assert!(matches!(
            record.validate(),
            Err(RecordInvariantError::NegativeOrNonFinite { field: "buy_sell_ratio", .. })
        ));
    }
}
