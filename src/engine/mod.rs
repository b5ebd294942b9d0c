// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod batch_runner;
pub mod comparison;
pub mod trace;

pub use batch_runner::{BatchOptions, BatchResult, BatchRunner};
pub use comparison::{ComparisonEngine, ComparisonStats, Direction, RecordDiff};
pub use trace::{ExecutionTrace, SampleTransformation, TraceError, TraceLimits, TraceRecorder};
