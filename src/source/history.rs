//! One-shot historical fetch over HTTP.

use std::time::Duration;

use reqwest::Client;
use sensorwatch_types::DeviceId;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::aggregator::Update;
use crate::data::{normalize_message, ClientSample};
use crate::error::ClientError;

/// Client for the historical query server.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    base_url: String,
    http: Client,
}

impl HistoryClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8080`.
    ///
    /// A fetch that has not completed within `timeout` fails, so a server
    /// that accepts but never answers still resolves the history status.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn url_for(&self, device: Option<&DeviceId>) -> String {
        match device {
            Some(device) => format!("{}/api/readings/by-device/{}", self.base_url, device),
            None => format!("{}/api/readings/recent", self.base_url),
        }
    }

    /// Fetch the most recent samples, newest first as served.
    pub async fn fetch_recent(
        &self,
        device: Option<&DeviceId>,
    ) -> Result<Vec<ClientSample>, ClientError> {
        let response = self.http.get(self.url_for(device)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        let body: Value = serde_json::from_slice(&response.bytes().await?)?;
        Ok(normalize_message(&body))
    }
}

/// Fetch once in the background and report the outcome to the aggregator.
///
/// The snapshot is handed over oldest first so each series ends with its
/// newest sample.
pub fn spawn_history(
    client: HistoryClient,
    device: Option<DeviceId>,
    updates: mpsc::Sender<Update>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let update = match client.fetch_recent(device.as_ref()).await {
            Ok(mut samples) => {
                info!(
                    event = "history_loaded",
                    url = %client.url_for(device.as_ref()),
                    count = samples.len(),
                    "Historical snapshot loaded"
                );
                samples.reverse();
                Update::Snapshot(samples)
            }
            Err(e) => {
                warn!(
                    event = "history_fetch_failed",
                    url = %client.url_for(device.as_ref()),
                    error = %e,
                    "Historical fetch failed, continuing with live data only"
                );
                Update::HistoryFailed(e.to_string())
            }
        };
        let _ = updates.send(update).await;
    })
}
