// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Collaborator implementations for the signal preview service.
//!
//! # Available Backends
//!
//! ## Fixture
//! - **FixtureScorer**: serves a pre-scored batch read from JSON
//! - **Use Case**: the CLI, demos and tests
//!
//! ## Memory
//! - **InMemoryPresetStore**: keyed weight presets behind a tokio `RwLock`
//! - **InMemoryLineageRecorder**: append-only lineage log for inspection
//!
//! ## Log
//! - **LogLineageRecorder**: emits every lineage fact as a tracing event
//!
//! ## Stub Backend (Test-Only)
//! - **SleepyExecutor**: fixed-latency record executor for budget tests
//! - **FailingScorer**, **FailingEnhancer**, **FailingLineageRecorder**:
//!   simulate collaborator failures
//! - **StepEnhancer**: deterministic confidence adjustment
//! - **Note**: NOT available in production builds
//!
//! # Example
//!
//! ```rust
//! use signal_sandbox::backends::fixture::FixtureScorer;
//!
//! let scorer = FixtureScorer::from_json_str("[]")?;
//! assert!(scorer.is_empty());
//! # Ok::<(), signal_sandbox::errors::CollaboratorError>(())
//! ```

pub mod fixture;
pub mod log_lineage;
pub mod memory;
#[cfg(test)]
pub mod stub;

pub use fixture::FixtureScorer;
pub use log_lineage::LogLineageRecorder;
pub use memory::{InMemoryLineageRecorder, InMemoryPresetStore};
