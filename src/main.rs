//! Vitalmon - session lifecycle and alerting coordinator
//!
//! Demo entry point: runs the coordinator against the mock acquisition
//! engine and logs device snapshots and degradation alerts.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use vitalmon::alerts::{LogSink, QualityMonitor};
use vitalmon::engine::mock::MockEngineFactory;
use vitalmon::{AppConfig, Coordinator, EventBridge};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vitalmon=info".parse().unwrap()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut watch: Vec<String> = Vec::new();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--version" | "-v" => {
                println!("vitalmon {}", vitalmon::VERSION);
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --config requires a file path");
                    return Ok(());
                }
                config_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
                continue;
            }
            "--watch" | "-w" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --watch requires a channel id");
                    return Ok(());
                }
                watch.push(args[i + 1].clone());
                i += 2;
                continue;
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                return Ok(());
            }
        }
    }

    let mut config = match &config_path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => AppConfig::load(),
    };
    config.enable_mock_devices = true;
    for channel_id in watch {
        config.watched_channels.insert(channel_id);
    }

    info!(version = vitalmon::VERSION, "Starting vitalmon");

    let bridge = Arc::new(EventBridge::new());
    let monitor = QualityMonitor::new(Box::new(LogSink));
    let coordinator = Coordinator::new(MockEngineFactory::new(), bridge.clone(), monitor);

    let (config_tx, config_rx) = mpsc::channel(8);
    let runner = tokio::spawn(coordinator.run(config_rx));
    config_tx.send(config).await?;

    // Log every bridged device snapshot
    let mut devices_rx = bridge.subscribe_devices();
    let logger = tokio::spawn(async move {
        while devices_rx.changed().await.is_ok() {
            let devices = devices_rx.borrow_and_update().clone();
            for device in &devices {
                let qualities: Vec<String> = device
                    .channels
                    .iter()
                    .map(|c| match c.signal_quality {
                        Some(q) => format!("{}={q:.2}", c.name),
                        None => format!("{}=n/a", c.name),
                    })
                    .collect();
                info!(
                    device = %device.id,
                    battery = device.battery,
                    drift_us = device.drift_us,
                    channels = %qualities.join(" "),
                    "Device update"
                );
            }
        }
    });

    // Ctrl+C closes the config channel; the run loop then stops the engine
    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    info!("Acquiring from mock devices, press Ctrl+C to stop");
    tokio::task::spawn_blocking(move || {
        let _ = stop_rx.recv();
    })
    .await?;

    info!("Shutting down");
    drop(config_tx);
    runner.await?;
    logger.abort();
    Ok(())
}

fn print_help() {
    println!("vitalmon {} - vitals session coordinator", vitalmon::VERSION);
    println!();
    println!("USAGE:");
    println!("    vitalmon [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>     Load configuration from PATH instead of the default location");
    println!("    -w, --watch <CHANNEL>   Add CHANNEL to the alerting watch-set (repeatable)");
    println!("    -v, --version           Print version");
    println!("    -h, --help              Show this help");
}
