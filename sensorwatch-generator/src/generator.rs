//! Sample synthesis and the emission loop.

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sensorwatch_transport::{Connector, TransportError};
use sensorwatch_types::{ConnectionState, DeviceId, RawSample, LOCAL_TIMESTAMP_FORMAT};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::publisher::ResilientPublisher;

const TEMPERATURE_SPAN: std::ops::RangeInclusive<f64> = 18.0..=34.0;
const HUMIDITY_SPAN: std::ops::RangeInclusive<f64> = 30.0..=80.0;

/// Build one synthetic sample for `device_id` stamped with `now`.
///
/// Temperature is drawn from 18..=34 and humidity from 30..=80, both
/// rounded to two decimals.
pub fn synth_sample<Tz, R>(device_id: &DeviceId, now: DateTime<Tz>, rng: &mut R) -> RawSample
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
    R: Rng + ?Sized,
{
    RawSample {
        generated_at: Some(now.format(LOCAL_TIMESTAMP_FORMAT).to_string()),
        device_id: Some(device_id.clone()),
        temperature: Some(round2(rng.gen_range(TEMPERATURE_SPAN))),
        humidity: Some(round2(rng.gen_range(HUMIDITY_SPAN))),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Emits one sample per interval for a single device.
///
/// # Example
///
/// ```rust
/// use sensorwatch_generator::GeneratorBuilder;
/// use sensorwatch_transport::MemoryQueue;
///
/// # tokio_test::block_on(async {
/// let queue = MemoryQueue::new("sensor.readings");
/// let mut generator = GeneratorBuilder::new().device_id(3).build(queue.connector());
///
/// let sample = generator.tick().await.unwrap();
/// assert_eq!(sample.device_id.unwrap().as_str(), "3");
/// assert_eq!(queue.len(), 1);
/// # });
/// ```
pub struct Generator<C: Connector> {
    device_id: DeviceId,
    interval: Duration,
    publisher: ResilientPublisher<C>,
    rng: StdRng,
}

impl<C: Connector> Generator<C> {
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Watch the publisher's connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.publisher.subscribe()
    }

    /// Produce and publish a single sample.
    ///
    /// Waits for a connection first, so the timestamp always reflects when
    /// the sample actually went out. A failed publish drops the sample.
    pub async fn tick(&mut self) -> Result<RawSample, TransportError> {
        self.publisher.ensure_connected().await;

        let sample = synth_sample(&self.device_id, Local::now(), &mut self.rng);
        let payload = sample.to_payload().to_string();
        debug!(payload = %payload, "Publishing sample");

        self.publisher.publish(payload.as_bytes()).await?;
        Ok(sample)
    }

    /// Run forever: one sample per interval while connected.
    pub async fn run(mut self) {
        info!(
            event = "generator_started",
            device_id = %self.device_id,
            interval_ms = self.interval.as_millis() as u64,
            "Generator started"
        );

        loop {
            match self.tick().await {
                Ok(sample) => {
                    info!(
                        event = "sample_published",
                        device_id = %self.device_id,
                        temperature = sample.temperature,
                        humidity = sample.humidity,
                        "Sample published"
                    );
                    tokio::time::sleep(self.interval).await;
                }
                Err(err) => {
                    // The publisher has already waited out its backoff.
                    warn!(
                        event = "publish_failed",
                        device_id = %self.device_id,
                        error = %err,
                        "Sample dropped"
                    );
                }
            }
        }
    }
}

/// Builder for configuring a [`Generator`].
///
/// The connector is only supplied at [`build`](GeneratorBuilder::build),
/// so the builder itself is not tied to a transport.
#[derive(Debug, Default)]
pub struct GeneratorBuilder {
    device_id: Option<DeviceId>,
    interval: Option<Duration>,
    backoff: Option<Backoff>,
    seed: Option<u64>,
}

impl GeneratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device identifier stamped on every sample. Defaults to `1`.
    pub fn device_id(mut self, device_id: impl Into<DeviceId>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Time between samples. Defaults to 5 seconds.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Seed the value generator for reproducible output.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build<C: Connector>(self, connector: C) -> Generator<C> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Generator {
            device_id: self.device_id.unwrap_or_else(|| DeviceId::from(1)),
            interval: self.interval.unwrap_or(Duration::from_secs(5)),
            publisher: ResilientPublisher::new(connector, self.backoff.unwrap_or_default()),
            rng,
        }
    }
}
