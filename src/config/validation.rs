// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Semantic validation of a loaded [`Config`].
//!
//! Deserialization only guarantees types. These checks catch settings that
//! would make the sandbox reject every script or every record: zero
//! budgets, inverted fuel bounds, and a batch budget too small to hold a
//! single record. All violations are collected, not just the first.
//!
//! # Example
//! ```rust
//! use signal_sandbox::config::{validate_config, Config};
//! use signal_sandbox::errors::ConfigValidationError;
//!
//! let mut config = Config::default();
//! config.sandbox.memory_bytes = 0;
//! config.batch.timeout_ms = 0;
//!
//! let errors = validate_config(&config);
//! assert_eq!(errors.len(), 2);
//! assert!(errors.contains(&ConfigValidationError::ZeroLimit { field: "sandbox.memory_bytes" }));
//! ```

use crate::config::Config;
use crate::errors::ConfigValidationError;

pub fn validate_config(cfg: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("sandbox.record_timeout_ms", cfg.sandbox.record_timeout_ms),
        ("batch.timeout_ms", cfg.batch.timeout_ms),
    ] {
        if value == 0 {
            errors.push(ConfigValidationError::ZeroDuration { field });
        }
    }

    for (field, value) in [
        ("sandbox.memory_bytes", cfg.sandbox.memory_bytes),
        ("sandbox.max_script_bytes", cfg.sandbox.max_script_bytes),
        ("sandbox.max_nesting", cfg.sandbox.max_nesting),
        ("batch.max_records", cfg.batch.max_records),
        ("trace.console_line_len", cfg.trace.console_line_len),
    ] {
        if value == 0 {
            errors.push(ConfigValidationError::ZeroLimit { field });
        }
    }

    let fuel = &cfg.sandbox.fuel;
    let (minimum, default, maximum) = (fuel.get_minimum(), fuel.get_default(), fuel.get_maximum());
    if minimum == 0 {
        errors.push(ConfigValidationError::ZeroLimit {
            field: "sandbox.fuel.minimum",
        });
    }
    if !(minimum <= default && default <= maximum) {
        errors.push(ConfigValidationError::FuelBoundsInverted {
            minimum,
            default,
            maximum,
        });
    }

    if cfg.trace.record_console_lines > cfg.trace.console_lines {
        errors.push(ConfigValidationError::ConsoleCapExceedsTrace {
            per_record: cfg.trace.record_console_lines,
            trace: cfg.trace.console_lines,
        });
    }

    if cfg.batch.timeout_ms > 0 && cfg.batch.timeout_ms < cfg.sandbox.record_timeout_ms {
        errors.push(ConfigValidationError::BatchBudgetTooSmall {
            batch_ms: cfg.batch.timeout_ms,
            record_ms: cfg.sandbox.record_timeout_ms,
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FuelConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_empty());
    }

    #[test]
    fn inverted_fuel_bounds_are_reported() {
        let mut cfg = Config::default();
        cfg.sandbox.fuel = FuelConfig {
            default: Some(5_000),
            minimum: Some(10_000),
            maximum: Some(1_000),
        };
        let errors = validate_config(&cfg);
        assert_eq!(
            errors,
            vec![ConfigValidationError::FuelBoundsInverted {
                minimum: 10_000,
                default: 5_000,
                maximum: 1_000,
            }]
        );
        assert!(errors[0].to_string().contains("minimum <= default <= maximum"));
    }

    #[test]
    fn console_caps_and_batch_budget_are_checked() {
        let mut cfg = Config::default();
        cfg.trace.record_console_lines = 20;
        cfg.trace.console_lines = 10;
        cfg.batch.timeout_ms = 100;
        cfg.sandbox.record_timeout_ms = 250;
        let errors = validate_config(&cfg);
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors[0],
            ConfigValidationError::ConsoleCapExceedsTrace { per_record: 20, trace: 10 }
        ));
        assert!(matches!(
            errors[1],
            ConfigValidationError::BatchBudgetTooSmall { batch_ms: 100, record_ms: 250 }
        ));
    }

    #[test]
    fn every_zero_is_reported() {
        let mut cfg = Config::default();
        cfg.sandbox.record_timeout_ms = 0;
        cfg.sandbox.max_nesting = 0;
        cfg.batch.max_records = 0;
        let errors = validate_config(&cfg);
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ConfigValidationError::ZeroDuration {
            field: "sandbox.record_timeout_ms"
        }));
    }
}
