// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::config::consts::*;
use crate::config::validation::validate_config;
use crate::errors::ConfigError;
use crate::observability::messages::validation::{ConfigInvalid, ConfigValidated};
use crate::observability::messages::StructuredLog;

/// Main configuration structure for the signal sandbox.
///
/// Every section is optional; missing sections and keys take the values in
/// [`crate::config::consts`].
///
/// # Example
/// ```yaml
/// sandbox:
///   record_timeout_ms: 250
///   memory_bytes: 4194304
///   fuel:
///     default: 1000000
///     maximum: 20000000
///   max_script_bytes: 16384
///   max_nesting: 32
/// batch:
///   timeout_ms: 10000
///   max_records: 5000
/// trace:
///   console_lines: 1000
///   record_console_lines: 50
///   console_line_len: 500
///   sample_size: 5
/// lineage:
///   enabled: true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub lineage: LineageConfig,
}

/// Per-record execution limits and validator bounds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_record_timeout_ms")]
    pub record_timeout_ms: u64,
    #[serde(default = "default_record_memory_bytes")]
    pub memory_bytes: usize,
    #[serde(default)]
    pub fuel: FuelConfig,
    #[serde(default = "default_max_script_bytes")]
    pub max_script_bytes: usize,
    #[serde(default = "default_max_nesting")]
    pub max_nesting: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            record_timeout_ms: DEFAULT_RECORD_TIMEOUT_MS,
            memory_bytes: DEFAULT_RECORD_MEMORY_BYTES,
            fuel: FuelConfig::default(),
            max_script_bytes: DEFAULT_MAX_SCRIPT_BYTES,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

impl SandboxConfig {
    pub fn record_timeout(&self) -> Duration {
        Duration::from_millis(self.record_timeout_ms)
    }
}

/// Fuel (operation count) limits for script execution.
///
/// Fuel stops runaway loops deterministically, before the wall-clock
/// budget does. All values are optional.
///
/// # Fields
/// * `default` - Fuel granted to each record (defaults to 1M)
/// * `minimum` - Smallest grantable fuel (defaults to 10K)
/// * `maximum` - Largest grantable fuel (defaults to 20M) - security limit
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FuelConfig {
    pub default: Option<u64>,
    pub minimum: Option<u64>,
    pub maximum: Option<u64>,
}

impl FuelConfig {
    pub fn get_default(&self) -> u64 {
        self.default.unwrap_or(DEFAULT_FUEL_LEVEL)
    }

    pub fn get_minimum(&self) -> u64 {
        self.minimum.unwrap_or(MIN_FUEL_LEVEL)
    }

    pub fn get_maximum(&self) -> u64 {
        self.maximum.unwrap_or(MAX_FUEL_LEVEL)
    }

    /// Clamps a requested fuel level to `[minimum, maximum]`.
    ///
    /// # Example
    /// ```
    /// use signal_sandbox::config::FuelConfig;
    ///
    /// let config = FuelConfig::default();
    /// assert_eq!(config.validate_and_clamp(1_000_000_000), 20_000_000);
    /// assert_eq!(config.validate_and_clamp(5), 10_000);
    /// ```
    pub fn validate_and_clamp(&self, requested: u64) -> u64 {
        let min = self.get_minimum();
        let max = self.get_maximum().max(min);
        requested.clamp(min, max)
    }

    /// The per-record fuel grant: the configured default, clamped.
    pub fn effective(&self) -> u64 {
        self.validate_and_clamp(self.get_default())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_batch_records")]
    pub max_records: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_BATCH_TIMEOUT_MS,
            max_records: DEFAULT_MAX_BATCH_RECORDS,
        }
    }
}

impl BatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceConfig {
    /// Tagged console lines kept across the whole trace.
    #[serde(default = "default_trace_console_lines")]
    pub console_lines: usize,
    /// Console lines kept per record before tagging.
    #[serde(default = "default_record_console_lines")]
    pub record_console_lines: usize,
    #[serde(default = "default_console_line_len")]
    pub console_line_len: usize,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            console_lines: DEFAULT_TRACE_CONSOLE_LINES,
            record_console_lines: DEFAULT_RECORD_CONSOLE_LINES,
            console_line_len: DEFAULT_CONSOLE_LINE_LEN,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineageConfig {
    #[serde(default = "default_lineage_enabled")]
    pub enabled: bool,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_record_timeout_ms() -> u64 {
    DEFAULT_RECORD_TIMEOUT_MS
}

fn default_record_memory_bytes() -> usize {
    DEFAULT_RECORD_MEMORY_BYTES
}

fn default_max_script_bytes() -> usize {
    DEFAULT_MAX_SCRIPT_BYTES
}

fn default_max_nesting() -> usize {
    DEFAULT_MAX_NESTING
}

fn default_batch_timeout_ms() -> u64 {
    DEFAULT_BATCH_TIMEOUT_MS
}

fn default_max_batch_records() -> usize {
    DEFAULT_MAX_BATCH_RECORDS
}

fn default_trace_console_lines() -> usize {
    DEFAULT_TRACE_CONSOLE_LINES
}

fn default_record_console_lines() -> usize {
    DEFAULT_RECORD_CONSOLE_LINES
}

fn default_console_line_len() -> usize {
    DEFAULT_CONSOLE_LINE_LEN
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

fn default_lineage_enabled() -> bool {
    true
}

/// On-disk configuration formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Picks the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

pub fn parse_config(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let cfg = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };
    Ok(cfg)
}

/// Load a config from a YAML or TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, format)
}

/// Load a config and reject it if any semantic check fails.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let cfg = load_config(path)?;
    let source = path.display().to_string();

    let errors = validate_config(&cfg);
    if !errors.is_empty() {
        ConfigInvalid {
            source: &source,
            error_count: errors.len(),
        }
        .log();
        return Err(ConfigError::Invalid(errors));
    }

    ConfigValidated { source: &source }.log();
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let cfg = parse_config("{}", ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.sandbox.fuel.effective(), DEFAULT_FUEL_LEVEL);
        assert!(cfg.lineage.enabled);
    }

    #[test]
    fn partial_yaml_overrides_only_given_keys() {
        let yaml = r#"
sandbox:
  record_timeout_ms: 100
  fuel:
    default: 50000
batch:
  timeout_ms: 2000
lineage:
  enabled: false
"#;
        let cfg = parse_config(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.sandbox.record_timeout(), Duration::from_millis(100));
        assert_eq!(cfg.sandbox.memory_bytes, DEFAULT_RECORD_MEMORY_BYTES);
        assert_eq!(cfg.sandbox.fuel.effective(), 50_000);
        assert_eq!(cfg.batch.timeout(), Duration::from_secs(2));
        assert_eq!(cfg.batch.max_records, DEFAULT_MAX_BATCH_RECORDS);
        assert!(!cfg.lineage.enabled);
    }

    #[test]
    fn toml_is_supported() {
        let toml = r#"
[sandbox]
memory_bytes = 65536

[trace]
sample_size = 2
"#;
        let cfg = parse_config(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.sandbox.memory_bytes, 65_536);
        assert_eq!(cfg.trace.sample_size, 2);
        assert_eq!(cfg.trace.console_lines, DEFAULT_TRACE_CONSOLE_LINES);
    }

    #[test]
    fn fuel_is_clamped_to_bounds() {
        let fuel = FuelConfig {
            default: Some(1),
            minimum: Some(100),
            maximum: Some(1_000),
        };
        assert_eq!(fuel.effective(), 100);
        assert_eq!(fuel.validate_and_clamp(5_000), 1_000);
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/b.YML")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("b.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("b.json")),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "json"
        ));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            parse_config("sandbox: [1, 2", ConfigFormat::Yaml),
            Err(ConfigError::Yaml(_))
        ));
    }
}
