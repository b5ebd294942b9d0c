// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Signal data model shared by the sandbox, the engine and the preview service.

mod outcome;
mod record;

pub use outcome::{ExecutionOutcome, RecordError, RecordErrorKind};
pub use record::{
    RecordInvariantError, SignalRecord, SignalStrength, SignalType, StrengthLabel, FIELD_ALIASES,
    RECORD_FIELDS,
};

#[cfg(test)]
pub(crate) use record::sample_record;
