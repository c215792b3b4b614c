//! Wiring: one aggregator fed by a historical fetch and a live subscriber.

use std::sync::Arc;
use std::time::Duration;

use sensorwatch_types::DeviceId;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::aggregator::{Aggregator, AggregatorView, DedupPolicy};
use crate::error::ClientError;
use crate::source::{spawn_history, HistoryClient, LiveSubscriber};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Root URL of the historical query server.
    pub history_url: String,
    /// Address of the live feed.
    pub live_addr: String,
    pub topic: String,
    /// Restrict the historical fetch to one device.
    pub device: Option<DeviceId>,
    /// Upper bound on the historical fetch.
    pub history_timeout: Duration,
    pub reconnect_delay: Duration,
    pub dedup: DedupPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            history_url: "http://127.0.0.1:8080".to_string(),
            live_addr: "127.0.0.1:9090".to_string(),
            topic: "readings".to_string(),
            device: None,
            history_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
            dedup: DedupPolicy::Disabled,
        }
    }
}

/// A running client: the aggregator plus its two source tasks.
///
/// The historical fetch and the live subscription start concurrently;
/// neither waits for the other.
#[derive(Debug)]
pub struct Client {
    aggregator: Aggregator,
    history: JoinHandle<()>,
    live: JoinHandle<()>,
}

impl Client {
    pub fn start(config: ClientConfig) -> Result<Self, ClientError> {
        let history_client = HistoryClient::new(config.history_url, config.history_timeout)?;
        let aggregator = Aggregator::builder().dedup(config.dedup).spawn();

        let history = spawn_history(
            history_client,
            config.device,
            aggregator.updates(),
        );
        let live = LiveSubscriber::new(config.live_addr, config.topic)
            .reconnect_delay(config.reconnect_delay)
            .spawn(aggregator.updates());

        Ok(Self {
            aggregator,
            history,
            live,
        })
    }

    pub fn view(&self) -> watch::Receiver<Arc<AggregatorView>> {
        self.aggregator.view()
    }

    pub fn snapshot(&self) -> Arc<AggregatorView> {
        self.aggregator.snapshot()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.history.abort();
        self.live.abort();
    }
}
