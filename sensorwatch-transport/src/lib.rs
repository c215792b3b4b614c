//! # sensorwatch-transport
//!
//! The transport channel connecting sample generators to the ingestion
//! service: an at-least-once, FIFO-per-destination queue.
//!
//! Producers go through a [`Connector`], which opens a [`Publisher`] link.
//! Consumers pull [`Delivery`] values from a [`Subscription`] and settle
//! each one with [`Delivery::ack`] (consumed) or [`Delivery::requeue`]
//! (redeliver later).
//!
//! ## Supported transports
//!
//! - **AMQP 0-9-1** (`amqp` feature, default) - RabbitMQ and compatible brokers
//! - **In-memory** - a single-process queue with outage simulation, used by
//!   tests and embedded setups
//!
//! ## Example
//!
//! ```rust
//! use sensorwatch_transport::{Connector, MemoryQueue, Publisher, Subscription};
//!
//! # tokio_test::block_on(async {
//! let queue = MemoryQueue::new("sensor.readings");
//! let mut link = queue.connector().connect().await.unwrap();
//! link.publish(b"{}").await.unwrap();
//!
//! let mut subscription = queue.subscribe();
//! let delivery = subscription.next_delivery().await.unwrap().unwrap();
//! assert_eq!(delivery.payload(), b"{}");
//! delivery.ack().await.unwrap();
//! # });
//! ```

use async_trait::async_trait;

mod delivery;
pub mod error;
mod memory;
mod uri;

#[cfg(feature = "amqp")]
pub mod amqp;

pub use delivery::Delivery;
pub use error::TransportError;
pub use memory::{MemoryConnector, MemoryLink, MemoryQueue, MemorySubscription};
pub use uri::with_credentials;

/// Opens publishing links to one destination.
///
/// A connector is cheap to keep around and may be asked to connect any
/// number of times; each successful call yields a fresh link.
#[async_trait]
pub trait Connector: Send + Sync {
    type Link: Publisher;

    /// Open a new link to the destination.
    async fn connect(&self) -> Result<Self::Link, TransportError>;

    /// Human-readable description of the endpoint, for logs.
    fn describe(&self) -> String;
}

/// An open link that can publish payloads to a destination.
#[async_trait]
pub trait Publisher: Send {
    /// Publish one payload. An error means the link is no longer usable.
    async fn publish(&mut self, payload: &[u8]) -> Result<(), TransportError>;
}

/// A consumer attached to a destination.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next delivery.
    ///
    /// Returns `Ok(None)` once the subscription has been closed and drained.
    async fn next_delivery(&mut self) -> Result<Option<Delivery>, TransportError>;
}
