// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Before/after statistics over a batch of outcomes.
//!
//! Classification of a modified outcome uses the *conviction* of its
//! signal type, the distance of its rank from `hold`:
//!
//! | before → after          | direction        |
//! |-------------------------|------------------|
//! | conviction grows        | `Improved`       |
//! | conviction shrinks      | `Degraded`       |
//! | side flips, same conviction (`buy → sell`) | `Degraded` |
//! | same type               | `UnchangedRank`  |
//!
//! So `modifiedCount == improvedCount + degradedCount + unchangedRankCount`
//! always holds. `avgConfidenceDelta` is the mean over every processed
//! outcome, unmodified ones contributing zero.

use serde::{Deserialize, Serialize};

use crate::signal::ExecutionOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Improved,
    Degraded,
    UnchangedRank,
    Unmodified,
}

/// Per-record comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDiff {
    pub ticker: String,
    pub modified: bool,
    pub type_changed: bool,
    pub confidence_delta: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonStats {
    pub total_signals: usize,
    pub modified_count: usize,
    pub improved_count: usize,
    pub degraded_count: usize,
    pub unchanged_rank_count: usize,
    pub avg_confidence_delta: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonEngine;

impl ComparisonEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn diff(&self, outcome: &ExecutionOutcome) -> RecordDiff {
        let before = outcome.before.signal_type;
        let after = outcome.after.signal_type;
        let type_changed = before != after;

        let direction = if !outcome.modified {
            Direction::Unmodified
        } else if !type_changed {
            Direction::UnchangedRank
        } else if after.conviction() > before.conviction() {
            Direction::Improved
        } else {
            Direction::Degraded
        };

        let confidence_delta = if outcome.modified {
            outcome.after.confidence_score - outcome.before.confidence_score
        } else {
            0.0
        };

        RecordDiff {
            ticker: outcome.ticker.clone(),
            modified: outcome.modified,
            type_changed,
            confidence_delta,
            direction,
        }
    }

    pub fn diffs(&self, outcomes: &[ExecutionOutcome]) -> Vec<RecordDiff> {
        outcomes.iter().map(|o| self.diff(o)).collect()
    }

    pub fn compare(&self, outcomes: &[ExecutionOutcome]) -> ComparisonStats {
        let mut stats = ComparisonStats {
            total_signals: outcomes.len(),
            ..ComparisonStats::default()
        };
        let mut delta_sum = 0.0;

        for diff in outcomes.iter().map(|o| self.diff(o)) {
            delta_sum += diff.confidence_delta;
            match diff.direction {
                Direction::Improved => stats.improved_count += 1,
                Direction::Degraded => stats.degraded_count += 1,
                Direction::UnchangedRank => stats.unchanged_rank_count += 1,
                Direction::Unmodified => continue,
            }
            stats.modified_count += 1;
        }

        if !outcomes.is_empty() {
            stats.avg_confidence_delta = delta_sum / outcomes.len() as f64;
        }
        stats
    }
}
