// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::sandbox::RecordRun;
use crate::script::ValidatedScript;
use crate::signal::SignalRecord;

/// Runs a validated script against a single record.
///
/// Implementations own their resource budget and must never fail the
/// call: record-level failures are reported through
/// `RecordRun::outcome.error` with the original record preserved.
#[async_trait]
pub trait RecordExecutor: Send + Sync {
    async fn execute(&self, script: &ValidatedScript, record: &SignalRecord) -> RecordRun;

    fn name(&self) -> &'static str;
}
