// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Signal preview: score, optionally enhance, optionally transform.
//!
//! # Execution Flow
//!
//! 1. **Request checks**: lookback window and weights are validated, and a
//!    named preset is resolved and overlaid by the request's own weights.
//! 2. **Scoring**: the injected [`SignalScorer`] produces the heuristic
//!    batch. Every record is checked against the data model.
//! 3. **Enhancement**: an optional [`ConfidenceEnhancer`] adjusts the batch.
//!    On failure the heuristic batch is kept and the response provenance
//!    carries the fallback reason.
//! 4. **Transformation**: if a script was supplied, the [`BatchRunner`]
//!    runs it. A rejected script, or a batch budget exhausted before any
//!    record completed, leaves the batch unchanged with `lambdaApplied =
//!    false` and `lambdaError` set.
//! 5. **Lineage**: an immutable fact with a reproducibility hash is handed
//!    to the optional [`LineageRecorder`] on a detached task. Its failure
//!    is logged and never reaches the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::consts::MAX_LOOKBACK_DAYS;
use crate::engine::{BatchRunner, ComparisonEngine, ComparisonStats, ExecutionTrace, RecordDiff};
use crate::errors::{PreviewError, SandboxError};
use crate::observability::messages::preview::{
    EnhancerFallback, LambdaNotApplied, LineageRecordFailed, PreviewCompleted, PreviewStarted,
};
use crate::observability::messages::StructuredLog;
use crate::signal::{SignalRecord, SignalType};
use crate::traits::{
    ConfidenceEnhancer, LineageEvent, LineageEventType, LineageRecorder, PresetStore, Provenance,
    SignalScorer, Weights,
};
use crate::utils::sha256_base64_parts;

/// Body of `POST /preview-signals`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    #[serde(default)]
    pub weights: Weights,
    pub lookback_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

/// Summary of the served batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSummary {
    pub total: usize,
    pub by_type: BTreeMap<SignalType, usize>,
    pub mean_confidence: f64,
    pub bipartisan_count: usize,
}

impl SignalSummary {
    pub fn from_signals(signals: &[SignalRecord]) -> Self {
        let mut by_type = BTreeMap::new();
        let mut confidence_sum = 0.0;
        let mut bipartisan_count = 0;
        for signal in signals {
            *by_type.entry(signal.signal_type).or_insert(0) += 1;
            confidence_sum += signal.confidence_score;
            if signal.bipartisan {
                bipartisan_count += 1;
            }
        }
        let mean_confidence = if signals.is_empty() {
            0.0
        } else {
            confidence_sum / signals.len() as f64
        };
        Self {
            total: signals.len(),
            by_type,
            mean_confidence,
            bipartisan_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub signals: Vec<SignalRecord>,
    pub stats: SignalSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diffs: Option<Vec<RecordDiff>>,
    pub lambda_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambda_trace: Option<ExecutionTrace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambda_error: Option<String>,
    pub provenance: Provenance,
}

/// The systems a preview talks to, injected at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub scorer: Arc<dyn SignalScorer>,
    pub enhancer: Option<Arc<dyn ConfidenceEnhancer>>,
    pub lineage: Option<Arc<dyn LineageRecorder>>,
    pub presets: Option<Arc<dyn PresetStore>>,
}

impl Collaborators {
    pub fn new(scorer: Arc<dyn SignalScorer>) -> Self {
        Self {
            scorer,
            enhancer: None,
            lineage: None,
            presets: None,
        }
    }

    pub fn with_enhancer(mut self, enhancer: Arc<dyn ConfidenceEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn with_lineage(mut self, lineage: Arc<dyn LineageRecorder>) -> Self {
        self.lineage = Some(lineage);
        self
    }

    pub fn with_presets(mut self, presets: Arc<dyn PresetStore>) -> Self {
        self.presets = Some(presets);
        self
    }
}

/// Outcome of the optional transformation step.
struct LambdaStage {
    signals: Vec<SignalRecord>,
    applied: bool,
    trace: Option<ExecutionTrace>,
    error: Option<String>,
    comparison: Option<ComparisonStats>,
    diffs: Option<Vec<RecordDiff>>,
    script_digest: Option<String>,
}

pub struct PreviewService {
    runner: BatchRunner,
    collaborators: Collaborators,
    max_records: usize,
    comparison: ComparisonEngine,
}

impl PreviewService {
    pub fn new(runner: BatchRunner, collaborators: Collaborators, max_records: usize) -> Self {
        Self {
            runner,
            collaborators,
            max_records,
            comparison: ComparisonEngine::new(),
        }
    }

    pub async fn preview(
        &self,
        request: PreviewRequest,
        cancel: &CancellationToken,
    ) -> Result<PreviewResponse, PreviewError> {
        let start_msg = PreviewStarted {
            lookback_days: request.lookback_days,
            weight_count: request.weights.len(),
            has_script: request.script.is_some(),
            preset: request.preset.as_deref(),
        };
        let span = start_msg.span("preview");
        start_msg.log();

        self.run_preview(&request, cancel).instrument(span).await
    }

    async fn run_preview(
        &self,
        request: &PreviewRequest,
        cancel: &CancellationToken,
    ) -> Result<PreviewResponse, PreviewError> {
        let started = Instant::now();
        check_request(request)?;

        let weights = self.resolve_weights(request).await?;

        let scored = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PreviewError::Cancelled),
            scored = self.collaborators.scorer.score(&weights, request.lookback_days) => {
                scored.map_err(PreviewError::Scoring)?
            }
        };
        if scored.len() > self.max_records {
            return Err(PreviewError::InvalidRequest(format!(
                "scored batch of {} records exceeds the limit of {}",
                scored.len(),
                self.max_records
            )));
        }
        for record in &scored {
            record
                .validate()
                .map_err(|e| PreviewError::InvalidScoredRecord(format!("{}: {}", record.ticker, e)))?;
        }

        let (records, provenance) = self.enhance(scored).await;
        let lambda = self.transform(request.script.as_deref(), records, cancel).await?;

        let response = PreviewResponse {
            stats: SignalSummary::from_signals(&lambda.signals),
            signals: lambda.signals,
            comparison: lambda.comparison,
            diffs: lambda.diffs,
            lambda_applied: lambda.applied,
            lambda_trace: lambda.trace,
            lambda_error: lambda.error,
            provenance,
        };

        self.record_lineage(&weights, request.lookback_days, lambda.script_digest, &response);

        PreviewCompleted {
            signal_count: response.signals.len(),
            lambda_applied: response.lambda_applied,
            provenance: response.provenance.label(),
            duration: started.elapsed(),
        }
        .log();
        Ok(response)
    }

    async fn resolve_weights(&self, request: &PreviewRequest) -> Result<Weights, PreviewError> {
        let Some(name) = request.preset.as_deref() else {
            return Ok(request.weights.clone());
        };
        let store = self
            .collaborators
            .presets
            .as_ref()
            .ok_or_else(|| PreviewError::UnknownPreset(name.to_string()))?;
        let preset = store
            .get(name)
            .await
            .map_err(PreviewError::PresetStore)?
            .ok_or_else(|| PreviewError::UnknownPreset(name.to_string()))?;
        Ok(preset.overlaid_by(&request.weights))
    }

    async fn enhance(&self, scored: Vec<SignalRecord>) -> (Vec<SignalRecord>, Provenance) {
        let Some(enhancer) = &self.collaborators.enhancer else {
            return (
                scored,
                Provenance::Heuristic {
                    fallback_reason: None,
                },
            );
        };

        let reason = match enhancer.enhance(scored.clone()).await {
            Ok(enhanced) => match check_enhanced(&scored, &enhanced) {
                Ok(()) => {
                    return (
                        enhanced,
                        Provenance::Enhanced {
                            model: enhancer.name().to_string(),
                        },
                    )
                }
                Err(reason) => reason,
            },
            Err(e) => e.to_string(),
        };

        EnhancerFallback {
            enhancer: enhancer.name(),
            reason: &reason,
        }
        .log();
        (
            scored,
            Provenance::Heuristic {
                fallback_reason: Some(reason),
            },
        )
    }

    async fn transform(
        &self,
        script: Option<&str>,
        records: Vec<SignalRecord>,
        cancel: &CancellationToken,
    ) -> Result<LambdaStage, PreviewError> {
        let Some(script) = script else {
            return Ok(LambdaStage {
                signals: records,
                applied: false,
                trace: None,
                error: None,
                comparison: None,
                diffs: None,
                script_digest: None,
            });
        };

        match self.runner.run_batch(script, records.clone(), cancel).await {
            Ok(result) => Ok(LambdaStage {
                signals: result.signals(),
                applied: true,
                comparison: Some(self.comparison.compare(&result.outcomes)),
                diffs: Some(self.comparison.diffs(&result.outcomes)),
                script_digest: Some(result.script_digest),
                trace: Some(result.trace),
                error: None,
            }),
            Err(SandboxError::Cancelled) => Err(PreviewError::Cancelled),
            Err(error) => {
                let reason = error.to_string();
                LambdaNotApplied { reason: &reason }.log();
                Ok(LambdaStage {
                    signals: records,
                    applied: false,
                    trace: None,
                    error: Some(reason),
                    comparison: None,
                    diffs: None,
                    script_digest: None,
                })
            }
        }
    }

    fn record_lineage(
        &self,
        weights: &Weights,
        lookback_days: u32,
        script_digest: Option<String>,
        response: &PreviewResponse,
    ) {
        let Some(recorder) = self.collaborators.lineage.clone() else {
            return;
        };
        let event_id = Uuid::new_v4();

        let event = match lineage_event(event_id, weights, lookback_days, script_digest, response) {
            Ok(event) => event,
            Err(error) => {
                LineageRecordFailed {
                    recorder: recorder.name(),
                    event_id: &event_id.to_string(),
                    error: &error,
                }
                .log();
                return;
            }
        };

        tokio::spawn(async move {
            if let Err(error) = recorder.record(event).await {
                LineageRecordFailed {
                    recorder: recorder.name(),
                    event_id: &event_id.to_string(),
                    error: &error,
                }
                .log();
            }
        });
    }
}

fn check_request(request: &PreviewRequest) -> Result<(), PreviewError> {
    if request.lookback_days == 0 || request.lookback_days > MAX_LOOKBACK_DAYS {
        return Err(PreviewError::InvalidRequest(format!(
            "lookbackDays must be between 1 and {}, got {}",
            MAX_LOOKBACK_DAYS, request.lookback_days
        )));
    }
    if let Some((name, value)) = request.weights.0.iter().find(|(_, v)| !v.is_finite()) {
        return Err(PreviewError::InvalidRequest(format!(
            "weight '{}' must be finite, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Enhancement may only adjust scores: same tickers, same order, valid records.
fn check_enhanced(scored: &[SignalRecord], enhanced: &[SignalRecord]) -> Result<(), String> {
    if scored.len() != enhanced.len() {
        return Err(format!(
            "enhancer returned {} records for {} inputs",
            enhanced.len(),
            scored.len()
        ));
    }
    for (before, after) in scored.iter().zip(enhanced) {
        if before.ticker != after.ticker {
            return Err(format!(
                "enhancer reordered records ('{}' became '{}')",
                before.ticker, after.ticker
            ));
        }
        after
            .validate()
            .map_err(|e| format!("enhancer produced an invalid record for '{}': {}", after.ticker, e))?;
    }
    Ok(())
}

/// Builds the lineage fact for a served response.
///
/// The reproducibility hash covers the inputs that determine the served
/// batch: weights, lookback, provenance, script digest and the records.
pub fn lineage_event(
    id: Uuid,
    weights: &Weights,
    lookback_days: u32,
    script_digest: Option<String>,
    response: &PreviewResponse,
) -> Result<LineageEvent, serde_json::Error> {
    let weights_json = serde_json::to_vec(weights)?;
    let provenance_json = serde_json::to_vec(&response.provenance)?;
    let signals_json = serde_json::to_vec(&response.signals)?;
    let lookback = lookback_days.to_be_bytes();
    let digest = script_digest.as_deref().unwrap_or_default();

    let reproducibility_hash = sha256_base64_parts([
        weights_json.as_slice(),
        lookback.as_slice(),
        provenance_json.as_slice(),
        digest.as_bytes(),
        signals_json.as_slice(),
    ]);

    Ok(LineageEvent {
        id,
        event_type: if response.lambda_applied {
            LineageEventType::LambdaApplied
        } else {
            LineageEventType::SignalsPreviewed
        },
        timestamp: chrono::Utc::now(),
        weights: weights.clone(),
        lookback_days,
        provenance: response.provenance.clone(),
        script_digest,
        record_snapshot: response.signals.clone(),
        reproducibility_hash,
    })
}
