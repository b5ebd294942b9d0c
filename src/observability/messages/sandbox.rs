// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for per-record sandbox execution.

use crate::observability::messages::StructuredLog;
use crate::signal::RecordErrorKind;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Script finished against one record and its output passed validation.
///
/// # Log Level
/// `debug!` - Per-record detail
///
/// # Example
/// ```
/// use signal_sandbox::observability::messages::sandbox::RecordExecuted;
/// use std::time::Duration;
///
/// let msg = RecordExecuted {
///     ticker: "NVDA",
///     modified: true,
///     fuel_consumed: 42,
///     duration: Duration::from_millis(3),
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct RecordExecuted<'a> {
    pub ticker: &'a str,
    pub modified: bool,
    pub fuel_consumed: u64,
    pub duration: Duration,
}

impl Display for RecordExecuted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Record '{}' executed in {:?} ({} operations, modified={})",
            self.ticker, self.duration, self.fuel_consumed, self.modified
        )
    }
}

impl StructuredLog for RecordExecuted<'_> {
    fn log(&self) {
        tracing::debug!(
            ticker = self.ticker,
            modified = self.modified,
            fuel_consumed = self.fuel_consumed,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "record_executed",
            span_name = name,
            ticker = self.ticker,
            modified = self.modified,
        )
    }
}

/// Record execution failed; the original record is kept.
///
/// # Log Level
/// `warn!` - Degraded behavior, the batch continues
pub struct RecordFailed<'a> {
    pub ticker: &'a str,
    pub kind: RecordErrorKind,
    pub message: &'a str,
}

impl RecordFailed<'_> {
    fn kind_str(&self) -> &'static str {
        match self.kind {
            RecordErrorKind::Resource => "resource",
            RecordErrorKind::Runtime => "runtime",
        }
    }
}

impl Display for RecordFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Record '{}' failed with {} error, keeping original: {}",
            self.ticker,
            self.kind_str(),
            self.message
        )
    }
}

impl StructuredLog for RecordFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            ticker = self.ticker,
            error_kind = self.kind_str(),
            error = self.message,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "record_failed",
            span_name = name,
            ticker = self.ticker,
            error_kind = self.kind_str(),
        )
    }
}

/// Host-side wall-clock budget expired and the script engine was interrupted.
///
/// # Log Level
/// `warn!` - Degraded behavior, the batch continues
///
/// # Example
/// ```
/// use signal_sandbox::observability::messages::sandbox::RecordTimedOut;
/// use std::time::Duration;
///
/// let msg = RecordTimedOut {
///     ticker: "NVDA",
///     budget: Duration::from_millis(500),
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct RecordTimedOut<'a> {
    pub ticker: &'a str,
    pub budget: Duration,
}

impl Display for RecordTimedOut<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Record '{}' exceeded its {:?} budget, interrupting script",
            self.ticker, self.budget
        )
    }
}

impl StructuredLog for RecordTimedOut<'_> {
    fn log(&self) {
        tracing::warn!(
            ticker = self.ticker,
            budget_ms = self.budget.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "record_timed_out",
            span_name = name,
            ticker = self.ticker,
            budget = ?self.budget,
        )
    }
}
