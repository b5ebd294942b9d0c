// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod collaborators;
pub mod executor;

pub use collaborators::{
    ConfidenceEnhancer, LineageEvent, LineageEventType, LineageRecorder, PresetStore, Provenance,
    SignalScorer, Weights,
};
pub use executor::RecordExecutor;
