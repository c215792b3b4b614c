//! sensorwatch-ingest - consumes, stores and fans out sensor samples.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sensorwatch_ingest::{
    hub, query, FanoutHub, IngestConfig, IngestService, JsonlStore, MemoryStore, SampleStore,
};
use sensorwatch_transport::amqp::AmqpConnector;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Consume sensor samples, store them and push them to live viewers
#[derive(Parser, Debug)]
#[command(name = "sensorwatch-ingest")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Broker URL, e.g. amqp://127.0.0.1:5672/%2f
    #[arg(short, long)]
    broker_url: Option<String>,

    /// Queue to consume from
    #[arg(long)]
    destination: Option<String>,

    /// JSON-lines store file (in-memory when omitted)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Address for the historical query server
    #[arg(long)]
    query_addr: Option<String>,

    /// Address for the live feed
    #[arg(long)]
    feed_addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config: IngestConfig = IngestConfig::builder(args.config.as_deref())?
        .set_override_option("broker_url", args.broker_url)?
        .set_override_option("destination", args.destination)?
        .set_override_option(
            "store_path",
            args.store.map(|p| p.to_string_lossy().into_owned()),
        )?
        .set_override_option("query_addr", args.query_addr)?
        .set_override_option("feed_addr", args.feed_addr)?
        .build()
        .context("failed to assemble configuration")?
        .try_deserialize()
        .context("invalid configuration")?;

    match &config.store_path {
        Some(path) => {
            let store = JsonlStore::open(path)
                .with_context(|| format!("failed to open store at {}", path.display()))?;
            run(config, Arc::new(store)).await
        }
        None => run(config, Arc::new(MemoryStore::new())).await,
    }
}

async fn run<S: SampleStore + 'static>(config: IngestConfig, store: Arc<S>) -> Result<()> {
    let hub = FanoutHub::new(config.topic.clone(), config.hub_capacity);

    let query_listener = TcpListener::bind(config.query_addr)
        .await
        .with_context(|| format!("failed to bind query server on {}", config.query_addr))?;
    let feed_listener = TcpListener::bind(config.feed_addr)
        .await
        .with_context(|| format!("failed to bind live feed on {}", config.feed_addr))?;

    let query_task = tokio::spawn(query::serve_query(query_listener, store.clone()));
    let feed_task = tokio::spawn(hub::serve_feed(feed_listener, hub.clone()));

    let connector = AmqpConnector::new(config.broker_uri(), config.destination.clone());
    let subscription = connector
        .subscribe("sensorwatch-ingest", 1)
        .await
        .context("failed to subscribe to the broker")?;
    info!(destination = %config.destination, "Subscribed to transport channel");

    let service = IngestService::new(store, hub);
    let result = tokio::select! {
        result = service.run(subscription) => result.context("ingestion stopped"),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    };

    query_task.abort();
    feed_task.abort();
    if let Err(e) = &result {
        error!(error = %e, "Ingestion terminated");
    }
    result
}
