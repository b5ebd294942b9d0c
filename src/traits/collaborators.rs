// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Boundaries to the systems around the sandbox.
//!
//! Scoring, confidence enhancement, preset storage and lineage persistence
//! are owned elsewhere. The preview service receives implementations as
//! `Arc<dyn _>` at construction time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::CollaboratorError;
use crate::signal::SignalRecord;

/// Newtype wrapper for named scoring weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights(pub BTreeMap<String, f64>);

impl Weights {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns these weights with every entry of `other` laid over them.
    pub fn overlaid_by(&self, other: &Weights) -> Weights {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), *v)));
        Weights(merged)
    }
}

impl From<BTreeMap<String, f64>> for Weights {
    fn from(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }
}

/// Where the confidence scores of a batch came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    /// Heuristic scores only. `fallback_reason` is set when an enhancer
    /// was configured but failed.
    Heuristic {
        #[serde(rename = "fallbackReason", skip_serializing_if = "Option::is_none")]
        fallback_reason: Option<String>,
    },
    /// Scores adjusted by the named enhancer.
    Enhanced { model: String },
}

impl Provenance {
    pub fn label(&self) -> &'static str {
        match self {
            Provenance::Heuristic { .. } => "heuristic",
            Provenance::Enhanced { .. } => "enhanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageEventType {
    /// Scored batch served without a transformation script.
    SignalsPreviewed,
    /// A transformation script ran over the batch.
    LambdaApplied,
}

impl LineageEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            LineageEventType::SignalsPreviewed => "signals_previewed",
            LineageEventType::LambdaApplied => "lambda_applied",
        }
    }
}

/// Immutable fact about one preview, handed to the lineage recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEvent {
    pub id: Uuid,
    pub event_type: LineageEventType,
    pub timestamp: DateTime<Utc>,
    pub weights: Weights,
    pub lookback_days: u32,
    pub provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_digest: Option<String>,
    pub record_snapshot: Vec<SignalRecord>,
    pub reproducibility_hash: String,
}

/// Produces the heuristic signal batch for a set of weights.
#[async_trait]
pub trait SignalScorer: Send + Sync {
    async fn score(
        &self,
        weights: &Weights,
        lookback_days: u32,
    ) -> Result<Vec<SignalRecord>, CollaboratorError>;

    fn name(&self) -> &'static str;
}

/// Adjusts confidence scores of a scored batch.
#[async_trait]
pub trait ConfidenceEnhancer: Send + Sync {
    async fn enhance(&self, records: Vec<SignalRecord>)
        -> Result<Vec<SignalRecord>, CollaboratorError>;

    fn name(&self) -> &'static str;
}

/// Persists lineage facts. Called fire-and-forget.
#[async_trait]
pub trait LineageRecorder: Send + Sync {
    async fn record(&self, event: LineageEvent) -> Result<(), CollaboratorError>;

    fn name(&self) -> &'static str;
}

/// Keyed storage of named weight sets.
#[async_trait]
pub trait PresetStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<Weights>, CollaboratorError>;

    async fn put(&self, name: &str, weights: Weights) -> Result<(), CollaboratorError>;

    /// Returns whether a preset was removed.
    async fn delete(&self, name: &str) -> Result<bool, CollaboratorError>;

    async fn list(&self) -> Result<Vec<String>, CollaboratorError>;
}
