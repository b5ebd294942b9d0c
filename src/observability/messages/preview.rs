// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the preview request lifecycle and its collaborators.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Preview request accepted.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use signal_sandbox::observability::messages::preview::PreviewStarted;
///
/// let msg = PreviewStarted {
///     lookback_days: 90,
///     weight_count: 4,
///     has_script: true,
///     preset: Some("momentum"),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct PreviewStarted<'a> {
    pub lookback_days: u32,
    pub weight_count: usize,
    pub has_script: bool,
    pub preset: Option<&'a str>,
}

impl Display for PreviewStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting signal preview: lookback={}d, {} weights, script={}",
            self.lookback_days, self.weight_count, self.has_script
        )?;
        if let Some(preset) = self.preset {
            write!(f, ", preset='{}'", preset)?;
        }
        Ok(())
    }
}

impl StructuredLog for PreviewStarted<'_> {
    fn log(&self) {
        tracing::info!(
            lookback_days = self.lookback_days,
            weight_count = self.weight_count,
            has_script = self.has_script,
            preset = self.preset,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "preview",
            span_name = name,
            lookback_days = self.lookback_days,
            has_script = self.has_script,
        )
    }
}

/// Preview response assembled.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PreviewCompleted<'a> {
    pub signal_count: usize,
    pub lambda_applied: bool,
    pub provenance: &'a str,
    pub duration: Duration,
}

impl Display for PreviewCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Signal preview completed in {:?}: {} signals, lambda_applied={}, provenance={}",
            self.duration, self.signal_count, self.lambda_applied, self.provenance
        )
    }
}

impl StructuredLog for PreviewCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            signal_count = self.signal_count,
            lambda_applied = self.lambda_applied,
            provenance = self.provenance,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "preview_completed",
            span_name = name,
            signal_count = self.signal_count,
            lambda_applied = self.lambda_applied,
        )
    }
}

/// Confidence enhancer failed; heuristic scores are kept.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
///
/// # Example
/// ```
/// use signal_sandbox::observability::messages::preview::EnhancerFallback;
///
/// let msg = EnhancerFallback {
///     enhancer: "fixture",
///     reason: "model unavailable",
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct EnhancerFallback<'a> {
    pub enhancer: &'a str,
    pub reason: &'a str,
}

impl Display for EnhancerFallback<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Confidence enhancer '{}' failed, falling back to heuristic scores: {}",
            self.enhancer, self.reason
        )
    }
}

impl StructuredLog for EnhancerFallback<'_> {
    fn log(&self) {
        tracing::warn!(
            enhancer = self.enhancer,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "enhancer_fallback",
            span_name = name,
            enhancer = self.enhancer,
        )
    }
}

/// Script was supplied but not applied to the batch.
///
/// # Log Level
/// `warn!` - Operator input refused or batch aborted
pub struct LambdaNotApplied<'a> {
    pub reason: &'a str,
}

impl Display for LambdaNotApplied<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Transformation script not applied: {}", self.reason)
    }
}

impl StructuredLog for LambdaNotApplied<'_> {
    fn log(&self) {
        tracing::warn!(reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("lambda_not_applied", span_name = name)
    }
}

/// Lineage fact could not be recorded; the preview is unaffected.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use signal_sandbox::observability::messages::preview::LineageRecordFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "store offline");
/// let msg = LineageRecordFailed {
///     recorder: "memory",
///     event_id: "6f1c",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct LineageRecordFailed<'a> {
    pub recorder: &'a str,
    pub event_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for LineageRecordFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Lineage recorder '{}' failed to record event {}: {}",
            self.recorder, self.event_id, self.error
        )
    }
}

impl StructuredLog for LineageRecordFailed<'_> {
    fn log(&self) {
        tracing::error!(
            recorder = self.recorder,
            event_id = self.event_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "lineage_record_failed",
            span_name = name,
            recorder = self.recorder,
            event_id = self.event_id,
        )
    }
}

/// Lineage fact written to the log stream.
///
/// # Log Level
/// `info!` - Audit event
///
/// # Example
/// ```
/// use signal_sandbox::observability::messages::preview::LineageRecorded;
///
/// let msg = LineageRecorded {
///     event_id: "6f1c",
///     event_type: "lambda_applied",
///     reproducibility_hash: "abc=",
///     signal_count: 10,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct LineageRecorded<'a> {
    pub event_id: &'a str,
    pub event_type: &'a str,
    pub reproducibility_hash: &'a str,
    pub signal_count: usize,
}

impl Display for LineageRecorded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Lineage event {} ({}) recorded for {} signals, hash {}",
            self.event_id, self.event_type, self.signal_count, self.reproducibility_hash
        )
    }
}

impl StructuredLog for LineageRecorded<'_> {
    fn log(&self) {
        tracing::info!(
            event_id = self.event_id,
            event_type = self.event_type,
            reproducibility_hash = self.reproducibility_hash,
            signal_count = self.signal_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "lineage_recorded",
            span_name = name,
            event_id = self.event_id,
        )
    }
}
