// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::config::Config;
use crate::engine::{BatchOptions, BatchRunner, TraceLimits};
use crate::sandbox::{ConsoleLimits, RecordBudget, SandboxExecutor};
use crate::script::ScriptValidator;
use crate::service::{Collaborators, PreviewService};

/// Sandbox runtime builder - wires validator, executor and batch runner from configuration.
///
/// The `RuntimeBuilder` turns a loaded [`Config`] into ready-to-use
/// components. Fuel is clamped to the configured bounds before it reaches
/// the executor.
///
/// # Examples
///
/// ## Building a preview service from configuration
/// ```
/// use std::sync::Arc;
/// use signal_sandbox::backends::FixtureScorer;
/// use signal_sandbox::config::{Config, RuntimeBuilder};
/// use signal_sandbox::service::Collaborators;
///
/// let config = Config::default();
/// let runner = RuntimeBuilder::from_config(&config);
/// assert_eq!(runner.options().timeout, config.batch.timeout());
///
/// let scorer = Arc::new(FixtureScorer::new(Vec::new()));
/// let _service = RuntimeBuilder::preview_service(&config, Collaborators::new(scorer));
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    pub fn validator(cfg: &Config) -> ScriptValidator {
        ScriptValidator::new(cfg.sandbox.max_script_bytes, cfg.sandbox.max_nesting)
    }

    /// Per-record executor with the configured budget and console caps.
    pub fn executor(cfg: &Config) -> SandboxExecutor {
        SandboxExecutor::new(
            RecordBudget {
                time: cfg.sandbox.record_timeout(),
                memory_bytes: cfg.sandbox.memory_bytes,
                fuel: cfg.sandbox.fuel.effective(),
            },
            ConsoleLimits {
                max_lines: cfg.trace.record_console_lines,
                max_line_len: cfg.trace.console_line_len,
            },
        )
    }

    pub fn from_config(cfg: &Config) -> BatchRunner {
        BatchRunner::new(
            Self::validator(cfg),
            Arc::new(Self::executor(cfg)),
            BatchOptions {
                timeout: cfg.batch.timeout(),
                trace: TraceLimits {
                    max_console_lines: cfg.trace.console_lines,
                    sample_size: cfg.trace.sample_size,
                },
            },
        )
    }

    /// Build the preview service. A lineage recorder is dropped when
    /// lineage is disabled in the configuration.
    pub fn preview_service(cfg: &Config, mut collaborators: Collaborators) -> PreviewService {
        if !cfg.lineage.enabled {
            collaborators.lineage = None;
        }
        PreviewService::new(Self::from_config(cfg), collaborators, cfg.batch.max_records)
    }
}
