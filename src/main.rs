// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use std::env;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use wengine::config::{load_and_validate_config, RuntimeBuilder};
use wengine::metadata::Metadata;
use wengine::traits::WorkflowEngine;

/// How often the CLI checks whether its workflow has finished.
const WATCH_INTERVAL: Duration = Duration::from_millis(200);

/// Parses trailing `key=value` arguments into workflow input.
fn parse_input(args: &[String]) -> Result<Metadata> {
    let mut input = Metadata::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            bail!("expected key=value, got '{arg}'");
        };
        input.add(key, value);
    }
    Ok(input)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <engine.yaml|engine.toml> <model-id> [key=value ...]", args[0]);
        eprintln!("Example: {} configs/engine.yaml nightly Source=/data/in", args[0]);
        std::process::exit(1);
    }
    let config_file = &args[1];
    let model_id = &args[2];
    let input = parse_input(&args[3..])?;

    let cfg = load_and_validate_config(config_file)
        .with_context(|| format!("loading engine config from {config_file}"))?;
    let engine = RuntimeBuilder::start(cfg).await?;

    let started = Instant::now();
    let instance_id = engine.start_workflow(model_id, input, None).await?;
    println!("Started {model_id} as {instance_id}");

    let state = loop {
        let state = engine.get_workflow_state(&instance_id).await?;
        if state.is_done() {
            break state;
        }
        tokio::time::sleep(WATCH_INTERVAL).await;
    };

    println!("Finished in {:.2?}: {}", started.elapsed(), state.kind().name());
    if !state.message().is_empty() {
        println!("  {}", state.message());
    }
    let metadata = engine.get_workflow_metadata(&instance_id, None).await?;
    for (key, values) in metadata.iter() {
        println!("  {key} = {}", values.join(", "));
    }

    engine.shutdown().await?;
    Ok(())
}
