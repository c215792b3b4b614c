//! sensorwatch-generator - publishes synthetic sensor samples.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sensorwatch_generator::{GeneratorBuilder, GeneratorConfig};
use sensorwatch_transport::amqp::AmqpConnector;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Publish one synthetic temperature/humidity sample per interval
#[derive(Parser, Debug)]
#[command(name = "sensorwatch-generator")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device identifier stamped on every sample
    #[arg(short, long)]
    device_id: Option<i64>,

    /// Broker URL, e.g. amqp://127.0.0.1:5672/%2f
    #[arg(short, long)]
    broker_url: Option<String>,

    /// Queue the samples are published to
    #[arg(long)]
    destination: Option<String>,

    /// Seconds between samples
    #[arg(short, long, allow_negative_numbers = true)]
    interval: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config: GeneratorConfig = GeneratorConfig::builder(args.config.as_deref())?
        .set_override_option("device_id", args.device_id)?
        .set_override_option("broker_url", args.broker_url)?
        .set_override_option("destination", args.destination)?
        .set_override_option("interval_secs", args.interval)?
        .build()
        .context("failed to assemble configuration")?
        .try_deserialize()
        .context("invalid configuration")?;
    config.validate()?;

    let connector = AmqpConnector::new(config.broker_uri(), config.destination.clone());
    info!(
        event = "generator_configured",
        device_id = config.device_id,
        destination = %config.destination,
        interval_secs = config.interval_secs,
        "Starting generator"
    );

    let generator = GeneratorBuilder::new()
        .device_id(config.device_id)
        .interval(config.interval())
        .backoff(config.backoff())
        .build(connector);

    tokio::select! {
        _ = generator.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
