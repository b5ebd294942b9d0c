// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;
use thiserror::Error;

use crate::script::ScriptSyntaxError;
use crate::signal::{RecordError, RecordErrorKind};

/// Reasons a script is rejected before any record is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SecurityError {
    #[error("script is {size} bytes, exceeding the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("script does not parse: {0}")]
    Syntax(#[from] ScriptSyntaxError),

    #[error("module imports are not allowed (line {line})")]
    ModuleImport { line: usize },

    #[error("'{construct}' is not allowed (line {line})")]
    ForbiddenConstruct { construct: String, line: usize },

    #[error("dynamic evaluation via '{name}' is not allowed (line {line})")]
    DynamicEvaluation { name: String, line: usize },

    #[error("access to system symbol '{name}' is not allowed (line {line})")]
    SystemAccess { name: String, line: usize },

    #[error("name-mangled or dunder identifier '{name}' is not allowed (line {line})")]
    DunderAccess { name: String, line: usize },

    #[error("unknown identifier '{name}' (line {line})")]
    UnknownIdentifier { name: String, line: usize },

    #[error("attribute '{name}' is not allowed (line {line})")]
    ForbiddenAttribute { name: String, line: usize },

    #[error("library name '{name}' cannot be rebound (line {line})")]
    LibraryRebinding { name: String, line: usize },
}

/// Per-record budget violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("timeout: record exceeded its {0:?} wall-clock budget")]
    Timeout(Duration),

    #[error("memory: record exceeded its {limit} byte ceiling")]
    Memory { limit: usize },

    #[error("fuel: record exhausted its budget of {budget} operations")]
    Fuel { budget: u64 },
}

/// Top-level sandbox failure taxonomy.
///
/// `Security`, `BatchTimeout` and `Cancelled` are batch-level and surface to
/// the caller. `Resource` and `Runtime` are record-level and are always
/// folded into [`ExecutionOutcome::error`](crate::signal::ExecutionOutcome)
/// via [`SandboxError::into_record_error`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SandboxError {
    #[error("security violation: {0}")]
    Security(#[from] SecurityError),

    #[error("resource limit exceeded: {0}")]
    Resource(#[from] ResourceError),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("batch budget of {budget:?} exhausted before any record completed")]
    BatchTimeout { budget: Duration },

    #[error("batch cancelled")]
    Cancelled,
}

impl SandboxError {
    pub fn is_batch_level(&self) -> bool {
        matches!(
            self,
            SandboxError::Security(_) | SandboxError::BatchTimeout { .. } | SandboxError::Cancelled
        )
    }

    /// Converts a record-level failure into the data form carried by an
    /// outcome. Batch-level variants map to `Runtime` with their message.
    pub fn into_record_error(self) -> RecordError {
        match self {
            SandboxError::Resource(err) => RecordError {
                kind: RecordErrorKind::Resource,
                message: err.to_string(),
            },
            SandboxError::Runtime(message) => RecordError {
                kind: RecordErrorKind::Runtime,
                message,
            },
            other => RecordError {
                kind: RecordErrorKind::Runtime,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_level_errors_fold_into_outcome_errors() {
        let resource = SandboxError::from(ResourceError::Memory { limit: 1024 }).into_record_error();
        assert_eq!(resource.kind, RecordErrorKind::Resource);
        assert!(resource.message.contains("1024"));

        let runtime = SandboxError::Runtime("KeyError on line 2: 'x'".into()).into_record_error();
        assert_eq!(runtime.kind, RecordErrorKind::Runtime);
        assert_eq!(runtime.message, "KeyError on line 2: 'x'");
    }

    #[test]
    fn batch_level_classification() {
        assert!(SandboxError::Cancelled.is_batch_level());
        assert!(SandboxError::from(SecurityError::ModuleImport { line: 1 }).is_batch_level());
        assert!(!SandboxError::Runtime("boom".into()).is_batch_level());
    }
}
