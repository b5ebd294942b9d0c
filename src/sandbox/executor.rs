// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Sandbox Executor
//!
//! Runs one validated script against one [`SignalRecord`] on a fresh,
//! resource-bounded script engine.
//!
//! ## Isolation
//!
//! Every call builds a new engine, scope, console buffer, fuel counter and
//! memory counter. Nothing the script binds or mutates can be
//! observed by the next record or by another request. The input record is
//! copied into script values; the original is never mutated.
//!
//! ## Resource Limits
//!
//! - **Wall clock**: the engine runs on a blocking worker
//!   (`tokio::task::spawn_blocking`). The host waits with
//!   `tokio::time::timeout`; on expiry it raises the interrupt flag, which
//!   the engine's progress callback observes on its next operation. The
//!   callback also checks the deadline itself, so an abandoned worker
//!   stops promptly.
//! - **Memory**: engine ceilings on string, list and dict sizes, size
//!   checks in host functions before they allocate, and a cumulative
//!   charge for every value stored into a variable, against `memory_bytes`.
//! - **Fuel**: the engine's operation budget.
//!
//! ## Outcome Contract
//!
//! On success the outcome carries the validated output record and
//! `modified = after != before`. On any failure (exception, budget
//! violation, invalid output) `after == before`, `modified == false`, and
//! the classified error is attached. Failures never escape as `Err`.

use async_trait::async_trait;
use rhai::Scope;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::{ResourceError, SandboxError};
use crate::observability::messages::sandbox::{RecordExecuted, RecordFailed, RecordTimedOut};
use crate::observability::messages::StructuredLog;
use crate::sandbox::console::{ConsoleBuffer, SharedConsole};
use crate::sandbox::schema::{bind_record, extract_output};
use crate::script::{CompiledScript, ConsoleSink, EvalError, Meter, ScriptRunner, ValidatedScript};
use crate::signal::{ExecutionOutcome, SignalRecord};
use crate::traits::RecordExecutor;

/// Per-record resource budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordBudget {
    pub time: Duration,
    pub memory_bytes: usize,
    pub fuel: u64,
}

/// Everything one record's execution produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRun {
    pub outcome: ExecutionOutcome,
    pub console: ConsoleBuffer,
    pub duration: Duration,
    pub fuel_consumed: u64,
}

/// Console capture limits applied to each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleLimits {
    pub max_lines: usize,
    pub max_line_len: usize,
}

#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    budget: RecordBudget,
    console: ConsoleLimits,
}

impl SandboxExecutor {
    pub fn new(budget: RecordBudget, console: ConsoleLimits) -> Self {
        Self { budget, console }
    }

    pub fn budget(&self) -> RecordBudget {
        self.budget
    }

    /// Runs `script` against `record` under an explicit budget.
    pub async fn run(
        &self,
        script: &ValidatedScript,
        record: &SignalRecord,
        budget: RecordBudget,
    ) -> RecordRun {
        let started = Instant::now();
        let console = SharedConsole::new(self.console.max_lines, self.console.max_line_len);
        let interrupt = Arc::new(AtomicBool::new(false));

        let worker = {
            let compiled = Arc::clone(script.compiled());
            let record = record.clone();
            let console = console.clone();
            let interrupt = Arc::clone(&interrupt);
            let deadline = started + budget.time;
            tokio::task::spawn_blocking(move || {
                execute_blocking(&compiled, &record, budget, interrupt, deadline, console)
            })
        };

        let (result, fuel_consumed) = match tokio::time::timeout(budget.time, worker).await {
            Ok(Ok(finished)) => finished,
            Ok(Err(join_error)) => (
                Err(SandboxError::Runtime(format!("sandbox worker failed: {join_error}"))),
                0,
            ),
            Err(_elapsed) => {
                // Forced interruption: the worker observes the flag on its next operation.
                interrupt.store(true, Ordering::Relaxed);
                RecordTimedOut {
                    ticker: &record.ticker,
                    budget: budget.time,
                }
                .log();
                (Err(ResourceError::Timeout(budget.time).into()), 0)
            }
        };

        let duration = started.elapsed();
        let outcome = match result {
            Ok(after) => {
                let outcome = ExecutionOutcome::transformed(record.clone(), after);
                RecordExecuted {
                    ticker: &record.ticker,
                    modified: outcome.modified,
                    fuel_consumed,
                    duration,
                }
                .log();
                outcome
            }
            Err(error) => {
                let error = error.into_record_error();
                RecordFailed {
                    ticker: &record.ticker,
                    kind: error.kind,
                    message: &error.message,
                }
                .log();
                ExecutionOutcome::failed(record.clone(), error)
            }
        };

        RecordRun {
            outcome,
            console: console.snapshot(),
            duration,
            fuel_consumed,
        }
    }
}

#[async_trait]
impl RecordExecutor for SandboxExecutor {
    async fn execute(&self, script: &ValidatedScript, record: &SignalRecord) -> RecordRun {
        self.run(script, record, self.budget).await
    }

    fn name(&self) -> &'static str {
        "sandbox"
    }
}

fn execute_blocking(
    compiled: &CompiledScript,
    record: &SignalRecord,
    budget: RecordBudget,
    interrupt: Arc<AtomicBool>,
    deadline: Instant,
    console: SharedConsole,
) -> (Result<SignalRecord, SandboxError>, u64) {
    let meter = Meter::new(budget.fuel, budget.memory_bytes)
        .with_interrupt(interrupt)
        .with_deadline(deadline);
    let runner = ScriptRunner::new(meter, Arc::new(console) as Arc<dyn ConsoleSink>);
    let mut scope = Scope::new();
    let aliases = bind_record(&mut scope, record);

    let result = runner
        .run(compiled, &mut scope)
        .map_err(|e| classify(e, budget))
        .and_then(|()| {
            extract_output(&scope, &aliases, record)
                .map_err(|e| SandboxError::Runtime(format!("invalid output: {e}")))
        });
    (result, runner.fuel_consumed())
}

fn classify(error: EvalError, budget: RecordBudget) -> SandboxError {
    match error {
        EvalError::Exception { .. } => SandboxError::Runtime(error.to_string()),
        EvalError::Interrupted => ResourceError::Timeout(budget.time).into(),
        EvalError::FuelExhausted(budget) => ResourceError::Fuel { budget }.into(),
        EvalError::MemoryExceeded { limit } => ResourceError::Memory { limit }.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::console::TRUNCATION_MARKER;
    use crate::script::ScriptValidator;
    use crate::signal::{sample_record, RecordErrorKind, SignalType};

    fn executor() -> SandboxExecutor {
        SandboxExecutor::new(
            RecordBudget {
                time: Duration::from_secs(2),
                memory_bytes: 1 << 20,
                fuel: 100_000,
            },
            ConsoleLimits {
                max_lines: 8,
                max_line_len: 120,
            },
        )
    }

    fn script(source: &str) -> ValidatedScript {
        ScriptValidator::new(16 * 1024, 32).validate(source).unwrap()
    }

    #[tokio::test]
    async fn scenario_a_alias_script_adjusts_confidence() {
        let mut record = sample_record("NVDA");
        record.buy_sell_ratio = 3.5;
        record.confidence_score = 0.85;
        record.signal_type = SignalType::Buy;

        let run = executor()
            .execute(&script("if ratio > 3.0: confidence += 0.05"), &record)
            .await;

        assert!(run.outcome.error.is_none());
        assert!(run.outcome.modified);
        assert!((run.outcome.after.confidence_score - 0.90).abs() < 1e-9);
        assert_eq!(run.outcome.after.signal_type, SignalType::Buy);
        assert_eq!(run.outcome.before, record);
        assert!(run.fuel_consumed > 0);
    }

    #[tokio::test]
    async fn runtime_error_falls_back_to_original() {
        let record = sample_record("XYZ");
        let run = executor()
            .execute(&script("x = signal['nope']"), &record)
            .await;

        let error = run.outcome.error.as_ref().unwrap();
        assert_eq!(error.kind, RecordErrorKind::Runtime);
        assert!(error.message.contains("KeyError"));
        assert_eq!(run.outcome.after, record);
        assert!(!run.outcome.modified);
    }

    #[tokio::test]
    async fn invalid_output_is_a_runtime_error() {
        let record = sample_record("ABC");
        let run = executor()
            .execute(&script("confidence = 2.0"), &record)
            .await;
        let error = run.outcome.error.unwrap();
        assert_eq!(error.kind, RecordErrorKind::Runtime);
        assert!(error.message.starts_with("invalid output"));
        assert_eq!(run.outcome.after, record);
    }

    #[tokio::test]
    async fn fuel_exhaustion_is_a_resource_error() {
        let record = sample_record("ABC");
        let run = executor()
            .execute(&script("while True:\n    pass"), &record)
            .await;
        let error = run.outcome.error.unwrap();
        assert_eq!(error.kind, RecordErrorKind::Resource);
        assert!(error.message.contains("fuel"));
        assert_eq!(run.fuel_consumed, 100_000);
    }

    #[tokio::test]
    async fn wall_clock_budget_interrupts_runaway_script() {
        let record = sample_record("ABC");
        let budget = RecordBudget {
            time: Duration::from_millis(50),
            memory_bytes: 1 << 20,
            fuel: u64::MAX,
        };
        let run = executor()
            .run(&script("print('start')\nwhile True:\n    pass"), &record, budget)
            .await;
        let error = run.outcome.error.unwrap();
        assert_eq!(error.kind, RecordErrorKind::Resource);
        assert!(error.message.contains("timeout"));
        assert_eq!(run.console.into_lines(), vec!["start".to_string()]);
    }

    #[tokio::test]
    async fn memory_ceiling_is_enforced() {
        let record = sample_record("ABC");
        let budget = RecordBudget {
            time: Duration::from_secs(2),
            memory_bytes: 2048,
            fuel: 1_000_000,
        };
        let run = executor()
            .run(&script("s = 'x'\nwhile True:\n    s = s + s"), &record, budget)
            .await;
        let error = run.outcome.error.unwrap();
        assert_eq!(error.kind, RecordErrorKind::Resource);
        assert!(error.message.contains("memory"));
    }

    #[tokio::test]
    async fn console_is_captured_per_record() {
        let record = sample_record("ABC");
        let run = executor()
            .execute(&script("for i in range(10):\n    print(i)"), &record)
            .await;
        assert_eq!(run.console.dropped(), 2);
        assert_eq!(run.console.lines().next().map(String::as_str), Some("2"));
        assert!(!run.outcome.modified);
    }

    #[tokio::test]
    async fn script_state_does_not_leak_between_records() {
        let exec = executor();
        let script = script("features['seen'] = len(features)\nsignal['features'] = features");
        let first = exec.execute(&script, &sample_record("A")).await;
        let second = exec.execute(&script, &sample_record("B")).await;
        assert_eq!(first.outcome.after.features, second.outcome.after.features);
        assert_eq!(second.outcome.after.features.get("seen"), Some(&1.0));
    }

    #[tokio::test]
    async fn self_referencing_appends_compare_without_recursing_forever() {
        let mut record = sample_record("ABC");
        record.bipartisan = false;
        let source = "\
a = []
for i in range(10):
    a.append(a)
b = list(a)
b.append(a)
bipartisan = a == a and b != a and len(b) == 11
";
        let run = executor().execute(&script(source), &record).await;
        assert!(run.outcome.error.is_none(), "{:?}", run.outcome.error);
        assert!(run.outcome.after.bipartisan);
    }

    #[tokio::test]
    async fn str_of_a_wide_value_is_refused_before_it_is_built() {
        let record = sample_record("ABC");
        let budget = RecordBudget {
            time: Duration::from_secs(2),
            memory_bytes: 200_000,
            fuel: 1_000_000,
        };
        let source = "\
x = -1.2345678901234567 * 10.0 ** 300
l = [x] * 10000
s = str(l)
";
        let run = executor().run(&script(source), &record, budget).await;
        let error = run.outcome.error.unwrap();
        assert_eq!(error.kind, RecordErrorKind::Resource);
        assert!(error.message.contains("memory"));
        assert!(run.duration < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn nested_repetition_is_sized_before_allocation() {
        let record = sample_record("ABC");
        let source = "\
l = [0] * 1000
m = [l] * 1000
n = [m] * 100
s = str(n)
";
        let run = executor().execute(&script(source), &record).await;
        let error = run.outcome.error.unwrap();
        assert_eq!(error.kind, RecordErrorKind::Resource);
        assert!(error.message.contains("memory"));
        assert!(run.duration < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn nesting_beyond_the_depth_ceiling_is_a_memory_error() {
        let record = sample_record("ABC");
        let run = executor()
            .execute(&script("a = []\nwhile True:\n    a = [a]"), &record)
            .await;
        let error = run.outcome.error.unwrap();
        assert_eq!(error.kind, RecordErrorKind::Resource);
        assert!(error.message.contains("memory"));
    }

    #[tokio::test]
    async fn printing_a_wide_value_keeps_only_a_capped_line() {
        let record = sample_record("ABC");
        let run = executor()
            .execute(&script("l = list(range(5000))\nprint('big', l)"), &record)
            .await;
        assert!(run.outcome.error.is_none(), "{:?}", run.outcome.error);
        let lines = run.console.into_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("big [0, 1, 2, "));
        assert!(lines[0].chars().count() <= 120 + TRUNCATION_MARKER.len());
    }
}
