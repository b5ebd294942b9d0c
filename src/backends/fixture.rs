// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::fs;
use std::path::Path;

use crate::errors::CollaboratorError;
use crate::signal::SignalRecord;
use crate::traits::{SignalScorer, Weights};

/// Serves a fixed, pre-scored batch of signals.
///
/// Stands in for the upstream scorer in the CLI and tests. Weights and
/// lookback are accepted but do not change the batch.
#[derive(Debug, Clone)]
pub struct FixtureScorer {
    records: Vec<SignalRecord>,
}

impl FixtureScorer {
    pub fn new(records: Vec<SignalRecord>) -> Self {
        Self { records }
    }

    /// Reads a JSON array of signal records from `path`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CollaboratorError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| CollaboratorError::Unavailable {
            collaborator: "fixture scorer",
            reason: format!("cannot read '{}': {}", path.display(), e),
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, CollaboratorError> {
        let records: Vec<SignalRecord> =
            serde_json::from_str(content).map_err(|e| CollaboratorError::Failed {
                collaborator: "fixture scorer",
                reason: format!("invalid signal fixture: {}", e),
            })?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SignalScorer for FixtureScorer {
    async fn score(
        &self,
        _weights: &Weights,
        _lookback_days: u32,
    ) -> Result<Vec<SignalRecord>, CollaboratorError> {
        Ok(self.records.clone())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{SignalStrength, SignalType};
    use std::io::Write;

    const FIXTURE: &str = r#"[
        {
            "ticker": "NVDA",
            "signal_type": "buy",
            "signal_strength": "high",
            "confidence_score": 0.85,
            "politician_activity_count": 12,
            "buy_sell_ratio": 3.5,
            "total_transaction_volume": 2500000.0,
            "bipartisan": true,
            "features": { "momentum": 0.7 }
        },
        {
            "ticker": "XOM",
            "signal_type": "sell",
            "signal_strength": 0.35,
            "confidence_score": 0.6,
            "politician_activity_count": 3,
            "buy_sell_ratio": 0.4,
            "total_transaction_volume": 150000.0,
            "bipartisan": false
        }
    ]"#;

    #[tokio::test]
    async fn parses_labels_scores_and_missing_features() {
        let scorer = FixtureScorer::from_json_str(FIXTURE).unwrap();
        let records = scorer.score(&Weights::new(), 30).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].signal_type, SignalType::Buy);
        assert_eq!(records[1].signal_strength, SignalStrength::Score(0.35));
        assert!(records[1].features.is_empty());
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();
        let scorer = FixtureScorer::from_json_file(file.path()).unwrap();
        assert_eq!(scorer.len(), 2);
    }

    #[test]
    fn rejects_unknown_signal_type() {
        let bad = FIXTURE.replace("\"sell\"", "\"moon\"");
        assert!(matches!(
            FixtureScorer::from_json_str(&bad),
            Err(CollaboratorError::Failed { .. })
        ));
    }

    #[test]
    fn missing_file_is_unavailable() {
        assert!(matches!(
            FixtureScorer::from_json_file("/nonexistent/signals.json"),
            Err(CollaboratorError::Unavailable { .. })
        ));
    }
}
