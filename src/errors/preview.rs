// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Failure reported by an injected collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("{collaborator} is unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("{collaborator} failed: {reason}")]
    Failed {
        collaborator: &'static str,
        reason: String,
    },
}

/// Request-level failures of a signal preview.
///
/// Script rejection and batch timeouts are not here: they are reported in
/// the response through `lambdaApplied` and `lambdaError`.
#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("signal scoring failed: {0}")]
    Scoring(#[source] CollaboratorError),

    #[error("preset lookup failed: {0}")]
    PresetStore(#[source] CollaboratorError),

    #[error("scored batch contains an invalid record: {0}")]
    InvalidScoredRecord(String),

    #[error("preview cancelled")]
    Cancelled,
}
