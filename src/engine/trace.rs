// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution trace accumulation.
//!
//! The [`TraceRecorder`] is fed one [`RecordRun`] per processed record, in
//! processing order, and keeps only bounded state: the most recent console
//! lines (each tagged with its ticker), every record error, and the first
//! few before/after pairs of modified records. Tallies are kept as running
//! counts so [`TraceRecorder::finalize`] never walks the outcomes again.
//! The batch's execution time is the wall time the caller measured around
//! the whole batch, handed in at finalization.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use crate::sandbox::RecordRun;
use crate::signal::{RecordError, SignalRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceError {
    pub ticker: String,
    pub error: RecordError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleTransformation {
    pub ticker: String,
    pub before: SignalRecord,
    pub after: SignalRecord,
}

/// Audit record of one batch.
///
/// `signals_modified <= signals_processed` and
/// `errors.len() <= signals_processed` always hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub console_output: Vec<String>,
    pub console_lines_dropped: usize,
    pub errors: Vec<TraceError>,
    pub sample_transformations: Vec<SampleTransformation>,
    pub execution_time_ms: u64,
    pub signals_processed: usize,
    pub signals_modified: usize,
    pub signals_unprocessed: usize,
    pub batch_timed_out: bool,
}

/// Bounds applied to a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceLimits {
    pub max_console_lines: usize,
    pub sample_size: usize,
}

#[derive(Debug)]
pub struct TraceRecorder {
    limits: TraceLimits,
    console: VecDeque<String>,
    console_dropped: usize,
    errors: Vec<TraceError>,
    samples: Vec<SampleTransformation>,
    processed: usize,
    modified: usize,
    unprocessed: usize,
    timed_out: bool,
}

impl TraceRecorder {
    pub fn new(limits: TraceLimits) -> Self {
        Self {
            limits,
            console: VecDeque::new(),
            console_dropped: 0,
            errors: Vec::new(),
            samples: Vec::new(),
            processed: 0,
            modified: 0,
            unprocessed: 0,
            timed_out: false,
        }
    }

    /// Folds one record's run into the trace. Call once per record, in order.
    pub fn accumulate(&mut self, run: &RecordRun) {
        let outcome = &run.outcome;

        // Lines the per-record buffer already dropped still count against the trace.
        self.console_dropped += run.console.dropped();
        for line in run.console.lines() {
            self.push_console(format!("[{}] {}", outcome.ticker, line));
        }

        if let Some(error) = &outcome.error {
            self.errors.push(TraceError {
                ticker: outcome.ticker.clone(),
                error: error.clone(),
            });
        }
        if outcome.modified {
            self.modified += 1;
            if self.samples.len() < self.limits.sample_size {
                self.samples.push(SampleTransformation {
                    ticker: outcome.ticker.clone(),
                    before: outcome.before.clone(),
                    after: outcome.after.clone(),
                });
            }
        }

        self.processed += 1;
    }

    /// Records that the aggregate budget stopped the batch with `remaining`
    /// records untouched.
    pub fn mark_batch_timed_out(&mut self, remaining: usize) {
        self.timed_out = true;
        self.unprocessed = remaining;
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Closes the trace. `elapsed` is the batch's wall time, including
    /// everything spent between records.
    pub fn finalize(self, elapsed: Duration) -> ExecutionTrace {
        ExecutionTrace {
            console_output: self.console.into(),
            console_lines_dropped: self.console_dropped,
            errors: self.errors,
            sample_transformations: self.samples,
            execution_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            signals_processed: self.processed,
            signals_modified: self.modified,
            signals_unprocessed: self.unprocessed,
            batch_timed_out: self.timed_out,
        }
    }

    fn push_console(&mut self, line: String) {
        if self.limits.max_console_lines == 0 {
            self.console_dropped += 1;
            return;
        }
        if self.console.len() == self.limits.max_console_lines {
            self.console.pop_front();
            self.console_dropped += 1;
        }
        self.console.push_back(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::ConsoleBuffer;
    use crate::signal::{sample_record, ExecutionOutcome, RecordErrorKind};

    fn run(ticker: &str, confidence: Option<f64>, lines: &[&str]) -> RecordRun {
        let before = sample_record(ticker);
        let outcome = match confidence {
            Some(c) => {
                let mut after = before.clone();
                after.confidence_score = c;
                ExecutionOutcome::transformed(before, after)
            }
            None => ExecutionOutcome::failed(
                before,
                RecordError {
                    kind: RecordErrorKind::Runtime,
                    message: "ValueError on line 1: bad".into(),
                },
            ),
        };
        let mut console = ConsoleBuffer::new(10, 80);
        for line in lines {
            console.push(line);
        }
        RecordRun {
            outcome,
            console,
            duration: Duration::from_millis(5),
            fuel_consumed: 10,
        }
    }

    fn limits() -> TraceLimits {
        TraceLimits {
            max_console_lines: 3,
            sample_size: 1,
        }
    }

    #[test]
    fn empty_trace_is_all_zero() {
        let trace = TraceRecorder::new(limits()).finalize(Duration::ZERO);
        assert_eq!(trace, ExecutionTrace::default());
    }

    #[test]
    fn console_lines_are_tagged_and_bounded() {
        let mut recorder = TraceRecorder::new(limits());
        recorder.accumulate(&run("ABC", Some(0.9), &["a1", "a2"]));
        recorder.accumulate(&run("XYZ", Some(0.85), &["x1", "x2"]));
        let trace = recorder.finalize(Duration::from_millis(10));
        assert_eq!(trace.console_output, vec!["[ABC] a2", "[XYZ] x1", "[XYZ] x2"]);
        assert_eq!(trace.console_lines_dropped, 1);
    }

    #[test]
    fn tallies_errors_and_samples() {
        let mut recorder = TraceRecorder::new(limits());
        recorder.accumulate(&run("ABC", Some(0.9), &[]));
        recorder.accumulate(&run("DEF", Some(0.95), &[]));
        recorder.accumulate(&run("XYZ", None, &[]));
        recorder.accumulate(&run("GHI", Some(0.85), &[]));
        let trace = recorder.finalize(Duration::from_millis(20));

        assert_eq!(trace.signals_processed, 4);
        assert_eq!(trace.signals_modified, 2);
        assert_eq!(trace.errors.len(), 1);
        assert_eq!(trace.errors[0].ticker, "XYZ");
        assert_eq!(trace.sample_transformations.len(), 1);
        assert_eq!(trace.sample_transformations[0].ticker, "ABC");
        assert_eq!(trace.execution_time_ms, 20);
        assert!(trace.signals_modified <= trace.signals_processed);
    }

    #[test]
    fn batch_timeout_is_flagged() {
        let mut recorder = TraceRecorder::new(limits());
        recorder.accumulate(&run("ABC", Some(0.9), &[]));
        recorder.mark_batch_timed_out(4);
        let trace = recorder.finalize(Duration::from_millis(5));
        assert!(trace.batch_timed_out);
        assert_eq!(trace.signals_unprocessed, 4);
        assert_eq!(trace.signals_processed, 1);
    }

    #[test]
    fn execution_time_is_the_wall_time_not_the_sum_of_records() {
        let mut recorder = TraceRecorder::new(limits());
        for ticker in ["A", "B", "C", "D"] {
            recorder.accumulate(&run(ticker, Some(0.9), &[]));
        }
        let trace = recorder.finalize(Duration::from_millis(7));
        assert_eq!(trace.execution_time_ms, 7);
    }
}
