// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for batch lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Batch start and completion
//! * Aggregate wall-clock budget exhaustion
//! * Cooperative cancellation

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Batch accepted by the validator and about to run.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use signal_sandbox::observability::messages::batch::BatchStarted;
///
/// let msg = BatchStarted {
///     script_digest: "abc=",
///     record_count: 5,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct BatchStarted<'a> {
    pub script_digest: &'a str,
    pub record_count: usize,
}

impl Display for BatchStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting sandbox batch: {} records, script {}",
            self.record_count, self.script_digest
        )
    }
}

impl StructuredLog for BatchStarted<'_> {
    fn log(&self) {
        tracing::info!(
            script_digest = self.script_digest,
            record_count = self.record_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "batch",
            span_name = name,
            script_digest = self.script_digest,
            record_count = self.record_count,
        )
    }
}

/// Batch finished, possibly partially.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use signal_sandbox::observability::messages::batch::BatchCompleted;
/// use std::time::Duration;
///
/// let msg = BatchCompleted {
///     processed: 10,
///     modified: 4,
///     errors: 1,
///     unprocessed: 0,
///     duration: Duration::from_millis(120),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct BatchCompleted {
    pub processed: usize,
    pub modified: usize,
    pub errors: usize,
    pub unprocessed: usize,
    pub duration: Duration,
}

impl Display for BatchCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Sandbox batch completed in {:?}: {} processed, {} modified, {} errors, {} unprocessed",
            self.duration, self.processed, self.modified, self.errors, self.unprocessed
        )
    }
}

impl StructuredLog for BatchCompleted {
    fn log(&self) {
        tracing::info!(
            processed = self.processed,
            modified = self.modified,
            errors = self.errors,
            unprocessed = self.unprocessed,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "batch_completed",
            span_name = name,
            processed = self.processed,
            unprocessed = self.unprocessed,
            duration = ?self.duration,
        )
    }
}

/// Aggregate budget ran out at a record boundary.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
pub struct BatchBudgetExhausted {
    pub budget: Duration,
    pub processed: usize,
    pub unprocessed: usize,
}

impl Display for BatchBudgetExhausted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Batch budget of {:?} exhausted after {} records, {} left unprocessed",
            self.budget, self.processed, self.unprocessed
        )
    }
}

impl StructuredLog for BatchBudgetExhausted {
    fn log(&self) {
        tracing::warn!(
            budget_ms = self.budget.as_millis() as u64,
            processed = self.processed,
            unprocessed = self.unprocessed,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "batch_budget_exhausted",
            span_name = name,
            processed = self.processed,
            unprocessed = self.unprocessed,
        )
    }
}

/// Caller cancelled the batch.
///
/// # Log Level
/// `info!` - Expected operational event
pub struct BatchCancelled {
    pub processed: usize,
    pub remaining: usize,
}

impl Display for BatchCancelled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Batch cancelled after {} records, discarding results ({} not started)",
            self.processed, self.remaining
        )
    }
}

impl StructuredLog for BatchCancelled {
    fn log(&self) {
        tracing::info!(
            processed = self.processed,
            remaining = self.remaining,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "batch_cancelled",
            span_name = name,
            processed = self.processed,
            remaining = self.remaining,
        )
    }
}
