// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported config format '{0}' (expected .yaml, .yml or .toml)")]
    UnsupportedFormat(String),

    #[error("configuration validation failed:\n{}", join_lines(.0))]
    Invalid(Vec<ConfigValidationError>),
}

fn join_lines(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A single semantic violation found by `validate_config`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// A duration that must be positive is zero
    ZeroDuration {
        /// Dotted path of the offending key
        field: &'static str,
    },
    /// A size or count limit that must be positive is zero
    ZeroLimit { field: &'static str },
    /// Fuel bounds are not ordered `minimum <= default <= maximum`
    FuelBoundsInverted { minimum: u64, default: u64, maximum: u64 },
    /// The per-record console cap exceeds the whole-trace cap
    ConsoleCapExceedsTrace { per_record: usize, trace: usize },
    /// The batch budget cannot fit even one record's budget
    BatchBudgetTooSmall { batch_ms: u64, record_ms: u64 },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValidationError::ZeroDuration { field } => {
                write!(f, "'{}' must be greater than zero milliseconds", field)
            }
            ConfigValidationError::ZeroLimit { field } => {
                write!(f, "'{}' must be greater than zero", field)
            }
            ConfigValidationError::FuelBoundsInverted {
                minimum,
                default,
                maximum,
            } => {
                write!(
                    f,
                    "fuel bounds must satisfy minimum <= default <= maximum (got {} <= {} <= {})",
                    minimum, default, maximum
                )
            }
            ConfigValidationError::ConsoleCapExceedsTrace { per_record, trace } => {
                write!(
                    f,
                    "per-record console cap ({}) exceeds trace console cap ({})",
                    per_record, trace
                )
            }
            ConfigValidationError::BatchBudgetTooSmall {
                batch_ms,
                record_ms,
            } => {
                write!(
                    f,
                    "batch timeout ({}ms) is shorter than the per-record timeout ({}ms)",
                    batch_ms, record_ms
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}
