// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit the same event with typed fields.
//!
//! # Organization
//!
//! * `validation` - script and configuration validation
//! * `sandbox` - per-record execution events
//! * `batch` - batch lifecycle, budget exhaustion and cancellation
//! * `preview` - preview request lifecycle and collaborator fallbacks
//!
//! # Usage Pattern
//!
//! ```rust
//! use signal_sandbox::observability::messages::batch::BatchStarted;
//! use signal_sandbox::observability::messages::StructuredLog;
//!
//! let msg = BatchStarted {
//!     script_digest: "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=",
//!     record_count: 12,
//! };
//!
//! msg.log();
//! ```

pub mod batch;
pub mod preview;
pub mod sandbox;
pub mod validation;

use tracing::Span;

/// Emits a message as a structured event, or opens a span carrying its fields.
pub trait StructuredLog {
    fn log(&self);

    fn span(&self, name: &str) -> Span;
}
