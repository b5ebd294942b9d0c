// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default per-record wall-clock budget (250 ms)
pub const DEFAULT_RECORD_TIMEOUT_MS: u64 = 250;
/// Default per-record memory ceiling (4 MiB)
pub const DEFAULT_RECORD_MEMORY_BYTES: usize = 4 * 1024 * 1024;

/// Default fuel level per record (1 million operations)
pub const DEFAULT_FUEL_LEVEL: u64 = 1_000_000;
/// Minimum allowed fuel level (10 thousand operations)
pub const MIN_FUEL_LEVEL: u64 = 10_000;
/// Maximum allowed fuel level (20 million operations) - security limit
pub const MAX_FUEL_LEVEL: u64 = 20_000_000;

/// Largest accepted script source (16 KiB)
pub const DEFAULT_MAX_SCRIPT_BYTES: usize = 16 * 1024;
/// Deepest accepted block/expression nesting
pub const DEFAULT_MAX_NESTING: usize = 32;

/// Default aggregate wall-clock budget for one batch (10 s)
pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 10_000;
/// Largest batch a preview will run
pub const DEFAULT_MAX_BATCH_RECORDS: usize = 5_000;

/// Console lines kept across a whole trace
pub const DEFAULT_TRACE_CONSOLE_LINES: usize = 1_000;
/// Console lines kept per record
pub const DEFAULT_RECORD_CONSOLE_LINES: usize = 50;
/// Characters kept per console line
pub const DEFAULT_CONSOLE_LINE_LEN: usize = 500;
/// Before/after pairs kept in a trace
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

/// Longest lookback window a preview accepts (5 years)
pub const MAX_LOOKBACK_DAYS: u32 = 5 * 365;
