// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::io::Write;
use std::time::Duration;

use crate::config::{load_and_validate_config, load_config, Config, RuntimeBuilder};
use crate::errors::{ConfigError, ConfigValidationError};

fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// The shipped YAML configuration matches the built-in defaults.
#[test]
fn shipped_yaml_config_loads() {
    let config = load_and_validate_config("configs/preview.yaml").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn shipped_toml_config_loads() {
    let config = load_and_validate_config("configs/strict.toml").unwrap();
    assert_eq!(config.sandbox.record_timeout(), Duration::from_millis(50));
    assert_eq!(config.sandbox.fuel.effective(), 50_000);
    assert_eq!(config.batch.max_records, 500);
    assert_eq!(config.trace.record_console_lines, 5);
    assert_eq!(config.trace.console_line_len, 500);
    assert!(!config.lineage.enabled);
}

#[test]
fn invalid_config_reports_every_violation() {
    let file = write_config(
        ".yaml",
        "sandbox:\n  memory_bytes: 0\n  fuel:\n    default: 5\n    minimum: 10\n",
    );
    let err = load_and_validate_config(file.path()).unwrap_err();
    match err {
        ConfigError::Invalid(errors) => {
            assert_eq!(errors.len(), 2);
            assert!(errors.contains(&ConfigValidationError::ZeroLimit {
                field: "sandbox.memory_bytes"
            }));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_config("configs/does-not-exist.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("does-not-exist.yaml"));
}

#[test]
fn unknown_extension_is_rejected() {
    let file = write_config(".json", "{}");
    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::UnsupportedFormat(_))
    ));
}

#[test]
fn runtime_reflects_configured_budgets() {
    let file = write_config(
        ".toml",
        "[sandbox]\nrecord_timeout_ms = 75\nmemory_bytes = 65536\n\n[sandbox.fuel]\ndefault = 1\n\n[batch]\ntimeout_ms = 500\n",
    );
    let config = load_and_validate_config(file.path()).unwrap();

    let budget = RuntimeBuilder::executor(&config).budget();
    assert_eq!(budget.time, Duration::from_millis(75));
    assert_eq!(budget.memory_bytes, 65_536);
    assert_eq!(budget.fuel, 10_000);

    let runner = RuntimeBuilder::from_config(&config);
    assert_eq!(runner.options().timeout, Duration::from_millis(500));
    assert_eq!(runner.options().trace.sample_size, 5);
}
