//! The ingestion pipeline: consume, validate, persist, broadcast.

use std::sync::Arc;
use std::time::Duration;

use sensorwatch_transport::Subscription;
use sensorwatch_types::{NormalizedSample, RawSample, ValidatedSample};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::{IngestError, ParseError, StoreError, ValidationError};
use crate::hub::FanoutHub;
use crate::payload;
use crate::store::SampleStore;
use crate::validate;

/// Why a message was dropped without being stored.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Outcome of handling one message. Both variants consume the message.
#[derive(Debug)]
pub enum Disposition {
    Accepted(NormalizedSample),
    Rejected(Rejection),
}

impl Disposition {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Disposition::Accepted(_))
    }
}

/// Processes messages one at a time, in delivery order.
///
/// A sample is always persisted before it is broadcast, so anything a live
/// subscriber sees can already be fetched from the store.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use sensorwatch_ingest::{FanoutHub, IngestService, MemoryStore};
///
/// # tokio_test::block_on(async {
/// let hub = FanoutHub::new("readings", 16);
/// let service = IngestService::new(Arc::new(MemoryStore::new()), hub.clone());
///
/// let outcome = service
///     .handle(br#"{"fechaGeneracion":"2024-12-21T10:15:00Z","IdDispositivo":1,"temperatura":21.5,"humedad":40}"#)
///     .await
///     .unwrap();
/// assert!(outcome.is_accepted());
///
/// let outcome = service.handle(b"{not json").await.unwrap();
/// assert!(!outcome.is_accepted());
/// # });
/// ```
pub struct IngestService<S: SampleStore> {
    store: Arc<S>,
    hub: FanoutHub,
    retry_delay: Duration,
}

impl<S: SampleStore> IngestService<S> {
    pub fn new(store: Arc<S>, hub: FanoutHub) -> Self {
        Self {
            store,
            hub,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Pause after handing a message back for redelivery. Defaults to 1s.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn hub(&self) -> &FanoutHub {
        &self.hub
    }

    /// Decode a raw message.
    pub fn consume(&self, message: &[u8]) -> Result<RawSample, ParseError> {
        payload::parse_bytes(message)
    }

    pub fn validate(&self, raw: &RawSample) -> Result<ValidatedSample, ValidationError> {
        validate::validate(raw)
    }

    /// Durable append; assigns identity and reception time.
    pub async fn persist(&self, sample: ValidatedSample) -> Result<NormalizedSample, StoreError> {
        self.store.insert(sample).await
    }

    /// Hand a stored sample to the live subscribers. Fire and forget.
    pub fn broadcast(&self, sample: &NormalizedSample) -> usize {
        self.hub.publish(sample.clone())
    }

    /// Run one message through the whole pipeline.
    ///
    /// Parse and validation failures are terminal and come back as
    /// [`Disposition::Rejected`]. Store failures are returned as errors so
    /// the caller can arrange redelivery.
    pub async fn handle(&self, message: &[u8]) -> Result<Disposition, IngestError> {
        let validated = match self
            .consume(message)
            .map_err(Rejection::from)
            .and_then(|raw| self.validate(&raw).map_err(Rejection::from))
        {
            Ok(validated) => validated,
            Err(rejection) => {
                warn!(
                    event = "reading_rejected",
                    reason = %rejection,
                    payload = %String::from_utf8_lossy(message),
                    "Rejected reading"
                );
                return Ok(Disposition::Rejected(rejection));
            }
        };

        let stored = self.persist(validated).await?;
        let receivers = self.broadcast(&stored);

        info!(
            event = "reading_processed",
            id = stored.id,
            device_id = %stored.device_id,
            generated_at = %stored.generated_at,
            received_at = %stored.received_at,
            temperature = stored.temperature,
            humidity = stored.humidity,
            receivers,
            "Reading processed"
        );
        Ok(Disposition::Accepted(stored))
    }

    /// Consume `subscription` until it closes.
    ///
    /// Handled messages (accepted or rejected) are acknowledged. Messages
    /// that hit an infrastructure failure are requeued for redelivery.
    pub async fn run<Sub: Subscription>(&self, mut subscription: Sub) -> Result<(), IngestError> {
        info!(event = "ingest_started", topic = self.hub.topic(), "Ingestion started");

        while let Some(delivery) = subscription.next_delivery().await? {
            match self.handle(delivery.payload()).await {
                Ok(_) => delivery.ack().await?,
                Err(err) => {
                    error!(
                        event = "reading_failed",
                        error = %err,
                        redelivered = delivery.redelivered(),
                        "Reading failed, requeueing"
                    );
                    delivery.requeue().await?;
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        info!(event = "ingest_stopped", "Subscription closed");
        Ok(())
    }
}
