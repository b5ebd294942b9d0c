// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::CollaboratorError;
use crate::sandbox::{ConsoleBuffer, RecordRun};
use crate::script::ValidatedScript;
use crate::signal::{ExecutionOutcome, SignalRecord};
use crate::traits::{
    ConfidenceEnhancer, LineageEvent, LineageRecorder, RecordExecutor, SignalScorer, Weights,
};

/// An executor that ignores the script, sleeps for a fixed time and
/// returns every record unchanged.
pub struct SleepyExecutor {
    per_record: Duration,
}

impl SleepyExecutor {
    pub fn new(per_record: Duration) -> Self {
        Self { per_record }
    }
}

#[async_trait]
impl RecordExecutor for SleepyExecutor {
    async fn execute(&self, _script: &ValidatedScript, record: &SignalRecord) -> RecordRun {
        tokio::time::sleep(self.per_record).await;
        RecordRun {
            outcome: ExecutionOutcome::transformed(record.clone(), record.clone()),
            console: ConsoleBuffer::new(0, 0),
            duration: self.per_record,
            fuel_consumed: 0,
        }
    }

    fn name(&self) -> &'static str {
        "sleepy"
    }
}

/// A scorer that always fails.
pub struct FailingScorer;

#[async_trait]
impl SignalScorer for FailingScorer {
    async fn score(
        &self,
        _weights: &Weights,
        _lookback_days: u32,
    ) -> Result<Vec<SignalRecord>, CollaboratorError> {
        Err(CollaboratorError::Unavailable {
            collaborator: "failing scorer",
            reason: "aggregates not loaded".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// An enhancer that raises every confidence by a fixed step, capped at 1.0.
pub struct StepEnhancer {
    pub step: f64,
}

#[async_trait]
impl ConfidenceEnhancer for StepEnhancer {
    async fn enhance(
        &self,
        records: Vec<SignalRecord>,
    ) -> Result<Vec<SignalRecord>, CollaboratorError> {
        Ok(records
            .into_iter()
            .map(|mut r| {
                r.confidence_score = (r.confidence_score + self.step).min(1.0);
                r
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "step"
    }
}

/// An enhancer that always fails.
pub struct FailingEnhancer;

#[async_trait]
impl ConfidenceEnhancer for FailingEnhancer {
    async fn enhance(
        &self,
        _records: Vec<SignalRecord>,
    ) -> Result<Vec<SignalRecord>, CollaboratorError> {
        Err(CollaboratorError::Failed {
            collaborator: "failing enhancer",
            reason: "model unavailable".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// A lineage recorder that always fails.
pub struct FailingLineageRecorder;

#[async_trait]
impl LineageRecorder for FailingLineageRecorder {
    async fn record(&self, _event: LineageEvent) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Unavailable {
            collaborator: "failing lineage recorder",
            reason: "store offline".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
