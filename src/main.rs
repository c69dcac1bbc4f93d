// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! FallWatch - Real-Time Fall Detection Alert Pipeline

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use fallwatch::core::{DirectoryFrameSource, Engine, StreamWorker};
use fallwatch::{Config, VERSION};

/// FallWatch - Real-Time Fall Detection Alert Pipeline
#[derive(Parser, Debug)]
#[command(name = "fallwatch")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Watches a video stream for falls and alerts caregivers")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Directory of images replayed as the video stream
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Pose model server base URL
    #[arg(long)]
    inference_endpoint: Option<String>,

    /// Directory for settings and event history
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn log_level(args: &Args, config: &Config) -> Level {
    if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::INFO)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&args, &config))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("FallWatch v{} - Real-Time Fall Detection Alert Pipeline", VERSION);
    info!("Configuration loaded from {:?}", config_path);

    // Override with command line args
    if let Some(data_dir) = args.data_dir {
        config = config.with_data_dir(data_dir);
    }
    if let Some(endpoint) = args.inference_endpoint {
        config.inference.endpoint = endpoint;
    }
    if let Some(frames_dir) = args.frames_dir {
        config.stream.enabled = true;
        config.stream.frames_dir = Some(frames_dir);
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    use tokio::sync::broadcast;

    let engine = Arc::new(Engine::new(&config));
    engine.start();

    {
        let engine = engine.clone();
        tokio::spawn(async move { engine.warm_up().await });
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let stream = match (&config.stream.frames_dir, config.stream.enabled) {
        (Some(dir), true) => match DirectoryFrameSource::open(dir, true) {
            Ok(source) => {
                let worker = StreamWorker::new(engine.clone(), config.stream.clone());
                let shutdown = shutdown_tx.subscribe();
                Some(tokio::spawn(async move { worker.run(source, shutdown).await }))
            }
            Err(e) => {
                error!("Cannot open frame directory {:?}: {}", dir, e);
                None
            }
        },
        (None, true) => {
            warn!("Stream enabled but no frames directory configured; waiting for discrete frames");
            None
        }
        _ => None,
    };

    info!("FallWatch running");
    info!("   Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, cleaning up...");

    let _ = shutdown_tx.send(());
    if let Some(handle) = stream {
        match handle.await {
            Ok(stats) => info!("Stream stats: {:?}", stats),
            Err(e) => error!("Stream worker failed: {}", e),
        }
    }

    engine.stop();
    info!("FallWatch shutdown complete");
    Ok(())
}
