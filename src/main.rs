// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::Context;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use signal_sandbox::backends::{FixtureScorer, InMemoryPresetStore, LogLineageRecorder};
use signal_sandbox::config::{load_and_validate_config, RuntimeBuilder};
use signal_sandbox::observability::init_tracing;
use signal_sandbox::service::{Collaborators, PreviewRequest, PreviewResponse};
use signal_sandbox::traits::Weights;

const DEFAULT_LOOKBACK_DAYS: u32 = 90;

/// Presets available to `--preset`.
fn builtin_presets() -> BTreeMap<String, Weights> {
    let preset = |pairs: &[(&str, f64)]| {
        Weights::from(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        )
    };
    BTreeMap::from([
        (
            "balanced".to_string(),
            preset(&[("volume", 0.25), ("activity", 0.25), ("ratio", 0.25), ("bipartisan", 0.25)]),
        ),
        (
            "momentum".to_string(),
            preset(&[("volume", 0.5), ("activity", 0.3), ("ratio", 0.2)]),
        ),
    ])
}

struct Args {
    config: String,
    signals: String,
    script: Option<String>,
    preset: Option<String>,
}

fn parse_args() -> Option<Args> {
    let mut positional = Vec::new();
    let mut preset = None;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--preset" {
            preset = Some(args.next()?);
        } else {
            positional.push(arg);
        }
    }
    if !(2..=3).contains(&positional.len()) {
        return None;
    }
    let mut positional = positional.into_iter();
    Some(Args {
        config: positional.next()?,
        signals: positional.next()?,
        script: positional.next(),
        preset,
    })
}

fn print_summary(response: &PreviewResponse) {
    println!("Signals: {}", response.stats.total);
    for (signal_type, count) in &response.stats.by_type {
        println!("  {:<12} {}", signal_type.as_str(), count);
    }
    println!("Mean confidence: {:.3}", response.stats.mean_confidence);
    println!("Provenance: {}", response.provenance.label());
    println!("Lambda applied: {}", response.lambda_applied);
    if let Some(error) = &response.lambda_error {
        println!("Lambda error: {}", error);
    }
    if let Some(comparison) = &response.comparison {
        println!(
            "Modified {} of {} ({} improved, {} degraded, {} same rank), avg confidence delta {:+.4}",
            comparison.modified_count,
            comparison.total_signals,
            comparison.improved_count,
            comparison.degraded_count,
            comparison.unchanged_rank_count,
            comparison.avg_confidence_delta
        );
    }
    if let Some(trace) = &response.lambda_trace {
        for line in &trace.console_output {
            println!("  | {}", line);
        }
        for error in &trace.errors {
            println!("  ! [{}] {}", error.ticker, error.error);
        }
        if trace.batch_timed_out {
            println!(
                "Batch budget exhausted: {} records left unchanged",
                trace.signals_unprocessed
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let Some(args) = parse_args() else {
        let program = env::args().next().unwrap_or_else(|| "signal-sandbox".to_string());
        eprintln!("Usage: {} <config.yaml|toml> <signals.json> [script] [--preset <name>]", program);
        eprintln!("Example: {} configs/preview.yaml demos/signals.json demos/scripts/boost.lambda", program);
        std::process::exit(1);
    };

    let config = load_and_validate_config(&args.config)
        .with_context(|| format!("loading {}", args.config))?;
    let scorer = FixtureScorer::from_json_file(&args.signals)
        .with_context(|| format!("reading {}", args.signals))?;
    let script = args
        .script
        .as_deref()
        .map(fs::read_to_string)
        .transpose()
        .context("reading script")?;

    let collaborators = Collaborators::new(Arc::new(scorer))
        .with_lineage(Arc::new(LogLineageRecorder))
        .with_presets(Arc::new(InMemoryPresetStore::with_presets(builtin_presets())));
    let service = RuntimeBuilder::preview_service(&config, collaborators);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let request = PreviewRequest {
        weights: Weights::new(),
        lookback_days: DEFAULT_LOOKBACK_DAYS,
        script,
        preset: args.preset,
    };
    let response = service.preview(request, &cancel).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    println!();
    print_summary(&response);
    Ok(())
}
