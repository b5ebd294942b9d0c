// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-record sandboxed execution: console capture, record/value schema
//! conversion and the resource-bounded executor.

pub mod console;
pub mod executor;
pub mod schema;

pub use console::{ConsoleBuffer, SharedConsole};
pub use executor::{ConsoleLimits, RecordBudget, RecordRun, SandboxExecutor};
pub use schema::SchemaError;
