// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for script and configuration validation.
//!
//! This module contains message types for logging events related to:
//! * Script acceptance and rejection by the static validator
//! * Configuration validation results

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Script passed every static check.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use signal_sandbox::observability::messages::validation::ScriptAccepted;
///
/// let msg = ScriptAccepted {
///     digest: "abc=",
///     size_bytes: 128,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ScriptAccepted<'a> {
    pub digest: &'a str,
    pub size_bytes: usize,
}

impl Display for ScriptAccepted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Script accepted ({} bytes, digest {})",
            self.size_bytes, self.digest
        )
    }
}

impl StructuredLog for ScriptAccepted<'_> {
    fn log(&self) {
        tracing::info!(
            digest = self.digest,
            size_bytes = self.size_bytes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::INFO,
            "span_name",
            name = name,
            digest = self.digest,
            size_bytes = self.size_bytes,
        )
    }
}

/// Script rejected before any record was touched.
///
/// # Log Level
/// `warn!` - Operator input refused
///
/// # Example
/// ```
/// use signal_sandbox::errors::SecurityError;
/// use signal_sandbox::observability::messages::validation::ScriptRejected;
///
/// let error = SecurityError::ModuleImport { line: 1 };
/// let msg = ScriptRejected {
///     size_bytes: 9,
///     error: &error,
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct ScriptRejected<'a> {
    pub size_bytes: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for ScriptRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Script rejected: {}", self.error)
    }
}

impl StructuredLog for ScriptRejected<'_> {
    fn log(&self) {
        tracing::warn!(
            size_bytes = self.size_bytes,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::WARN,
            "span_name",
            name = name,
            size_bytes = self.size_bytes,
            error = %self.error,
        )
    }
}

/// Configuration validation completed with no violations.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ConfigValidated<'a> {
    pub source: &'a str,
}

impl Display for ConfigValidated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Configuration '{}' validated", self.source)
    }
}

impl StructuredLog for ConfigValidated<'_> {
    fn log(&self) {
        tracing::info!(source = self.source, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::INFO,
            "span_name",
            name = name,
            source = self.source,
        )
    }
}

/// Configuration validation found violations.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use signal_sandbox::observability::messages::validation::ConfigInvalid;
///
/// let msg = ConfigInvalid {
///     source: "configs/preview.yaml",
///     error_count: 2,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct ConfigInvalid<'a> {
    pub source: &'a str,
    pub error_count: usize,
}

impl Display for ConfigInvalid<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Configuration '{}' failed validation with {} errors",
            self.source, self.error_count
        )
    }
}

impl StructuredLog for ConfigInvalid<'_> {
    fn log(&self) {
        tracing::error!(
            source = self.source,
            error_count = self.error_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            source = self.source,
            error_count = self.error_count,
        )
    }
}
