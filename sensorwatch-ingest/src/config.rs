//! Ingestion service configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub broker_url: String,
    pub broker_user: String,
    pub broker_password: String,
    pub destination: String,
    /// JSON-lines file for the store; in-memory when unset.
    pub store_path: Option<PathBuf>,
    pub query_addr: SocketAddr,
    pub feed_addr: SocketAddr,
    pub topic: String,
    pub hub_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            broker_url: "amqp://127.0.0.1:5672/%2f".to_string(),
            broker_user: "guest".to_string(),
            broker_password: "guest".to_string(),
            destination: "sensor.readings".to_string(),
            store_path: None,
            query_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            feed_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            topic: "readings".to_string(),
            hub_capacity: 256,
        }
    }
}

impl IngestConfig {
    /// Load from an optional file plus `SENSORWATCH_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::builder(path)?.build()?.try_deserialize()
    }

    pub fn builder(
        path: Option<&Path>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("broker_url", defaults.broker_url)?
            .set_default("broker_user", defaults.broker_user)?
            .set_default("broker_password", defaults.broker_password)?
            .set_default("destination", defaults.destination)?
            .set_default("query_addr", defaults.query_addr.to_string())?
            .set_default("feed_addr", defaults.feed_addr.to_string())?
            .set_default("topic", defaults.topic)?
            .set_default("hub_capacity", defaults.hub_capacity as u64)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Ok(builder.add_source(Environment::with_prefix("SENSORWATCH")))
    }

    pub fn broker_uri(&self) -> String {
        sensorwatch_transport::with_credentials(
            &self.broker_url,
            &self.broker_user,
            &self.broker_password,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "store_path = \"/var/lib/sensorwatch/readings.jsonl\"\nfeed_addr = \"127.0.0.1:9999\"\nbroker_url = \"amqp://admin:secret@mq:5672/%2f\""
        )
        .unwrap();

        let config = IngestConfig::load(Some(file.path())).unwrap();
        assert_eq!(
            config.store_path.as_deref(),
            Some(Path::new("/var/lib/sensorwatch/readings.jsonl"))
        );
        assert_eq!(config.feed_addr, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(config.query_addr, IngestConfig::default().query_addr);
        assert_eq!(config.topic, "readings");
        assert_eq!(config.broker_uri(), "amqp://admin:secret@mq:5672/%2f");
    }
}
