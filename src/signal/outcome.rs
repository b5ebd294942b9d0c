// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fmt;

use super::SignalRecord;

/// Classification of a record-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordErrorKind {
    /// Time, memory or fuel budget exceeded.
    Resource,
    /// The script raised, or produced output that failed schema validation.
    Runtime,
}

/// A record-level failure, surfaced as data rather than as an exception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordError {
    pub kind: RecordErrorKind,
    pub message: String,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of running the transformation script against one record.
///
/// When `error` is set the transformation was rejected as a whole: `after`
/// equals `before` and `modified` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub ticker: String,
    pub before: SignalRecord,
    pub after: SignalRecord,
    pub modified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RecordError>,
}

impl ExecutionOutcome {
    pub fn transformed(before: SignalRecord, after: SignalRecord) -> Self {
        let modified = after != before;
        Self {
            ticker: before.ticker.clone(),
            before,
            after,
            modified,
            error: None,
        }
    }

    pub fn failed(before: SignalRecord, error: RecordError) -> Self {
        Self {
            ticker: before.ticker.clone(),
            after: before.clone(),
            before,
            modified: false,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::sample_record;

    #[test]
    fn failed_outcome_keeps_original_record() {
        let before = sample_record("XYZ");
        let outcome = ExecutionOutcome::failed(
            before.clone(),
            RecordError {
                kind: RecordErrorKind::Runtime,
                message: "boom".into(),
            },
        );
        assert_eq!(outcome.after, before);
        assert!(!outcome.modified);
        assert!(outcome.is_error());
    }

    #[test]
    fn transformed_outcome_detects_field_changes() {
        let before = sample_record("ABC");
        let unchanged = ExecutionOutcome::transformed(before.clone(), before.clone());
        assert!(!unchanged.modified);

        let mut after = before.clone();
        after.features.insert("extra".into(), 1.0);
        let changed = ExecutionOutcome::transformed(before, after);
        assert!(changed.modified);
    }
}
