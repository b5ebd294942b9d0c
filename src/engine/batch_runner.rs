// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Batch orchestration of the sandbox.
//!
//! The [`BatchRunner`] validates a script exactly once, then drives the
//! injected [`RecordExecutor`] over every record of the batch, one record at
//! a time, feeding each run into a [`TraceRecorder`].
//!
//! # Execution Flow
//!
//! 1. **Validation**: the script is statically checked. A rejection returns
//!    [`SandboxError::Security`] before any record is touched.
//! 2. **Record boundary**: before each record the runner checks the
//!    cancellation token and the aggregate wall-clock budget.
//! 3. **Execution**: the record runs under its own budget inside the
//!    executor. Record failures come back as data in the outcome and never
//!    stop the batch.
//! 4. **Finalization**: the trace is finalized and returned with the
//!    outcomes and any records left unprocessed.
//!
//! # Budget Exhaustion
//!
//! The aggregate budget is checked only at record boundaries, so the record
//! in flight when it runs out is allowed to finish under its own per-record
//! budget. The remaining records are returned unchanged in
//! [`BatchResult::unprocessed`] and the trace is flagged `batch_timed_out`.
//! If the budget is gone before the first record completes, the batch
//! fails with [`SandboxError::BatchTimeout`] instead.
//!
//! # Cancellation
//!
//! A cancelled [`CancellationToken`] is observed at the next record
//! boundary. Outcomes computed so far are discarded and the batch returns
//! [`SandboxError::Cancelled`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use signal_sandbox::engine::{BatchOptions, BatchRunner, TraceLimits};
//! use signal_sandbox::sandbox::{ConsoleLimits, RecordBudget, SandboxExecutor};
//! use signal_sandbox::script::ScriptValidator;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = SandboxExecutor::new(
//!     RecordBudget { time: Duration::from_millis(500), memory_bytes: 1 << 20, fuel: 100_000 },
//!     ConsoleLimits { max_lines: 20, max_line_len: 200 },
//! );
//! let runner = BatchRunner::new(
//!     ScriptValidator::new(16 * 1024, 32),
//!     Arc::new(executor),
//!     BatchOptions {
//!         timeout: Duration::from_secs(5),
//!         trace: TraceLimits { max_console_lines: 100, sample_size: 5 },
//!     },
//! );
//!
//! let result = runner
//!     .run_batch("confidence = min(confidence + 0.05, 1.0)", Vec::new(), &CancellationToken::new())
//!     .await?;
//! assert_eq!(result.trace.signals_processed, 0);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::engine::trace::{ExecutionTrace, TraceLimits, TraceRecorder};
use crate::errors::SandboxError;
use crate::observability::messages::batch::{
    BatchBudgetExhausted, BatchCancelled, BatchCompleted, BatchStarted,
};
use crate::observability::messages::validation::{ScriptAccepted, ScriptRejected};
use crate::observability::messages::StructuredLog;
use crate::script::{ScriptValidator, ValidatedScript};
use crate::signal::{ExecutionOutcome, SignalRecord};
use crate::traits::RecordExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Aggregate wall-clock budget, including validation.
    pub timeout: Duration,
    pub trace: TraceLimits,
}

/// Everything a batch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub script_digest: String,
    /// One outcome per processed record, in input order.
    pub outcomes: Vec<ExecutionOutcome>,
    /// Records the aggregate budget prevented from running, unchanged.
    pub unprocessed: Vec<SignalRecord>,
    pub trace: ExecutionTrace,
}

impl BatchResult {
    /// The full output batch: each processed record's `after`, followed by
    /// the unprocessed records as they came in.
    pub fn signals(&self) -> Vec<SignalRecord> {
        self.outcomes
            .iter()
            .map(|o| o.after.clone())
            .chain(self.unprocessed.iter().cloned())
            .collect()
    }

    pub fn is_partial(&self) -> bool {
        self.trace.batch_timed_out
    }
}

pub struct BatchRunner {
    validator: ScriptValidator,
    executor: Arc<dyn RecordExecutor>,
    options: BatchOptions,
}

impl BatchRunner {
    pub fn new(
        validator: ScriptValidator,
        executor: Arc<dyn RecordExecutor>,
        options: BatchOptions,
    ) -> Self {
        Self {
            validator,
            executor,
            options,
        }
    }

    pub fn options(&self) -> BatchOptions {
        self.options
    }

    /// Validates `script` without running it.
    pub fn validate(&self, script: &str) -> Result<ValidatedScript, SandboxError> {
        match self.validator.validate(script) {
            Ok(validated) => {
                ScriptAccepted {
                    digest: validated.digest(),
                    size_bytes: validated.size_bytes(),
                }
                .log();
                Ok(validated)
            }
            Err(error) => {
                ScriptRejected {
                    size_bytes: script.len(),
                    error: &error,
                }
                .log();
                Err(error.into())
            }
        }
    }

    /// Validates `script` once and runs it over `records` in order.
    pub async fn run_batch(
        &self,
        script: &str,
        records: Vec<SignalRecord>,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, SandboxError> {
        let started = Instant::now();
        let script = self.validate(script)?;

        let start_msg = BatchStarted {
            script_digest: script.digest(),
            record_count: records.len(),
        };
        let span = start_msg.span("run_batch");
        start_msg.log();

        self.run_validated(&script, records, cancel, started)
            .instrument(span)
            .await
    }

    async fn run_validated(
        &self,
        script: &ValidatedScript,
        records: Vec<SignalRecord>,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<BatchResult, SandboxError> {
        let deadline = started + self.options.timeout;
        let total = records.len();
        let mut recorder = TraceRecorder::new(self.options.trace);
        let mut outcomes = Vec::with_capacity(total);
        let mut unprocessed = Vec::new();
        let mut pending = records.into_iter();

        while let Some(record) = pending.next() {
            if cancel.is_cancelled() {
                BatchCancelled {
                    processed: outcomes.len(),
                    remaining: total - outcomes.len(),
                }
                .log();
                return Err(SandboxError::Cancelled);
            }

            if Instant::now() >= deadline {
                if outcomes.is_empty() {
                    return Err(SandboxError::BatchTimeout {
                        budget: self.options.timeout,
                    });
                }
                unprocessed.push(record);
                unprocessed.extend(pending.by_ref());
                BatchBudgetExhausted {
                    budget: self.options.timeout,
                    processed: outcomes.len(),
                    unprocessed: unprocessed.len(),
                }
                .log();
                recorder.mark_batch_timed_out(unprocessed.len());
                break;
            }

            let run = self.executor.execute(script, &record).await;
            recorder.accumulate(&run);
            outcomes.push(run.outcome);
        }

        let duration = started.elapsed();
        let trace = recorder.finalize(duration);
        BatchCompleted {
            processed: trace.signals_processed,
            modified: trace.signals_modified,
            errors: trace.errors.len(),
            unprocessed: trace.signals_unprocessed,
            duration,
        }
        .log();

        Ok(BatchResult {
            script_digest: script.digest().to_string(),
            outcomes,
            unprocessed,
            trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::SleepyExecutor;
    use crate::errors::SecurityError;
    use crate::sandbox::{ConsoleBuffer, RecordRun};
    use crate::signal::{sample_record, ExecutionOutcome};

    fn runner(timeout: Duration, per_record: Duration) -> BatchRunner {
        BatchRunner::new(
            ScriptValidator::new(4096, 32),
            Arc::new(SleepyExecutor::new(per_record)),
            BatchOptions {
                timeout,
                trace: TraceLimits {
                    max_console_lines: 10,
                    sample_size: 3,
                },
            },
        )
    }

    fn batch(n: usize) -> Vec<SignalRecord> {
        (0..n).map(|i| sample_record(&format!("T{i}"))).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_script_touches_nothing() {
        let result = runner(Duration::from_secs(2), Duration::from_millis(10))
            .run_batch("import os", batch(3), &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(SandboxError::Security(SecurityError::ModuleImport { line: 1 }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_yields_partial_result() {
        let result = runner(Duration::from_millis(2000), Duration::from_millis(700))
            .run_batch("pass", batch(10), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.outcomes.len(), 3);
        assert_eq!(result.unprocessed.len(), 7);
        assert_eq!(result.unprocessed[0].ticker, "T3");
        assert!(result.is_partial());
        assert_eq!(result.trace.signals_unprocessed, 7);
        assert_eq!(result.trace.execution_time_ms, 2100);
        assert_eq!(result.signals().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_is_a_batch_timeout() {
        let result = runner(Duration::ZERO, Duration::from_millis(10))
            .run_batch("pass", batch(2), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(SandboxError::BatchTimeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_discards_outcomes() {
        let cancel = CancellationToken::new();
        let runner = runner(Duration::from_secs(60), Duration::from_millis(100));
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            trigger.cancel();
        });
        let result = runner.run_batch("pass", batch(10), &cancel).await;
        assert!(matches!(result, Err(SandboxError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_is_not_an_error() {
        let result = runner(Duration::from_secs(1), Duration::from_millis(10))
            .run_batch("pass", Vec::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.outcomes.is_empty());
        assert_eq!(result.trace, ExecutionTrace::default());
        assert!(!result.script_digest.is_empty());
    }

    /// Sleeps per record but reports a near-zero duration for each run.
    struct UnderReporting(Duration);

    #[async_trait::async_trait]
    impl RecordExecutor for UnderReporting {
        async fn execute(&self, _script: &ValidatedScript, record: &SignalRecord) -> RecordRun {
            tokio::time::sleep(self.0).await;
            RecordRun {
                outcome: ExecutionOutcome::transformed(record.clone(), record.clone()),
                console: ConsoleBuffer::new(0, 0),
                duration: Duration::from_millis(1),
                fuel_consumed: 0,
            }
        }

        fn name(&self) -> &'static str {
            "under-reporting"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn execution_time_is_batch_wall_time() {
        let runner = BatchRunner::new(
            ScriptValidator::new(4096, 32),
            Arc::new(UnderReporting(Duration::from_millis(300))),
            BatchOptions {
                timeout: Duration::from_secs(60),
                trace: TraceLimits {
                    max_console_lines: 10,
                    sample_size: 3,
                },
            },
        );
        let result = runner
            .run_batch("pass", batch(4), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.trace.execution_time_ms, 1200);
    }
}
