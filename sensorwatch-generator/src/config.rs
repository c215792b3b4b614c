//! Generator configuration.
//!
//! Values come from built-in defaults, an optional config file and
//! `SENSORWATCH_*` environment variables, in increasing order of
//! precedence. Command-line flags are applied on top by the binary.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::backoff::Backoff;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("interval must be greater than zero, got {0}s")]
    InvalidInterval(i64),

    #[error("backoff multiplier must be a finite number >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("initial backoff must be greater than zero")]
    InvalidInitialBackoff,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub device_id: i64,
    pub broker_url: String,
    pub broker_user: String,
    pub broker_password: String,
    pub destination: String,
    /// Seconds between samples. Signed so that a negative value from the
    /// environment is reported rather than rejected by the deserializer.
    pub interval_secs: i64,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            device_id: 1,
            broker_url: "amqp://127.0.0.1:5672/%2f".to_string(),
            broker_user: "guest".to_string(),
            broker_password: "guest".to_string(),
            destination: "sensor.readings".to_string(),
            interval_secs: 5,
            initial_backoff_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl GeneratorConfig {
    /// Load from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::builder(path)?.build()?.try_deserialize().map_err(Into::into)
    }

    /// The layered source builder, exposed so the binary can add overrides.
    pub fn builder(
        path: Option<&Path>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("device_id", defaults.device_id)?
            .set_default("broker_url", defaults.broker_url)?
            .set_default("broker_user", defaults.broker_user)?
            .set_default("broker_password", defaults.broker_password)?
            .set_default("destination", defaults.destination)?
            .set_default("interval_secs", defaults.interval_secs)?
            .set_default("initial_backoff_ms", defaults.initial_backoff_ms)?
            .set_default("backoff_multiplier", defaults.backoff_multiplier)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Ok(builder.add_source(Environment::with_prefix("SENSORWATCH")))
    }

    /// Reject values the generator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs <= 0 {
            return Err(ConfigError::InvalidInterval(self.interval_secs));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(self.backoff_multiplier));
        }
        if self.initial_backoff_ms == 0 {
            return Err(ConfigError::InvalidInitialBackoff);
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(0) as u64)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.initial_backoff_ms),
            self.backoff_multiplier,
        )
    }

    /// Broker URL with the configured credentials filled in.
    pub fn broker_uri(&self) -> String {
        sensorwatch_transport::with_credentials(
            &self.broker_url,
            &self.broker_user,
            &self.broker_password,
        )
    }
}
