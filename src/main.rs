//! sensorwatch - prints a live summary of the telemetry pipeline.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sensorwatch::data::duration::parse_duration;
use sensorwatch::{AggregatorView, Client, ClientConfig, DedupPolicy, HistoryStatus};
use sensorwatch_types::DeviceId;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Live summary of sensor readings
#[derive(Parser, Debug)]
#[command(name = "sensorwatch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Historical query server root URL
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    history_url: String,

    /// Live feed address
    #[arg(long, default_value = "127.0.0.1:9090")]
    live_addr: String,

    /// Live feed topic
    #[arg(short, long, default_value = "readings")]
    topic: String,

    /// Only fetch history for this device
    #[arg(short, long)]
    device: Option<String>,

    /// Give up on the historical fetch after this long
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    history_timeout: Duration,

    /// Delay before reconnecting the live feed (e.g., "3s", "500ms")
    #[arg(long, default_value = "3s", value_parser = parse_duration)]
    reconnect_delay: Duration,

    /// Skip live samples already present in a series
    #[arg(long)]
    dedup: bool,

    /// Seconds between printed summaries
    #[arg(short, long, default_value = "1")]
    refresh: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ClientConfig {
        history_url: args.history_url,
        live_addr: args.live_addr,
        topic: args.topic,
        device: args.device.as_deref().and_then(DeviceId::new),
        history_timeout: args.history_timeout,
        reconnect_delay: args.reconnect_delay,
        dedup: if args.dedup {
            DedupPolicy::ById
        } else {
            DedupPolicy::Disabled
        },
    };
    info!(?config, "Starting client");

    let client = Client::start(config)?;
    let mut timer = tokio::time::interval(Duration::from_secs(args.refresh.max(1)));

    loop {
        tokio::select! {
            _ = timer.tick() => println!("{}", summary(&client.snapshot())),
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn summary(view: &AggregatorView) -> String {
    let history = match &view.status.history {
        HistoryStatus::Pending => "pending".to_string(),
        HistoryStatus::Loaded(n) => format!("loaded({n})"),
        HistoryStatus::Failed => "failed".to_string(),
    };
    let fmt = |v: Option<f64>| v.map_or_else(|| "--".to_string(), |v| format!("{v:.2}"));
    let last = view
        .recency
        .map_or_else(|| "never".to_string(), |r| r.to_string());

    let mut out = format!(
        "live={} history={} devices={} temp={} hum={} last={}",
        view.status.live,
        history,
        view.series.len(),
        fmt(view.aggregates.mean_temperature),
        fmt(view.aggregates.mean_humidity),
        last,
    );
    if let Some(error) = &view.status.last_error {
        out.push_str(&format!(" error=\"{error}\""));
    }
    for (device, series) in &view.series {
        if let Some(latest) = series.latest() {
            out.push_str(&format!(
                "\n  device {device}: {} samples, temp={} hum={}",
                series.len(),
                fmt(latest.temperature),
                fmt(latest.humidity),
            ));
        }
    }
    out
}
