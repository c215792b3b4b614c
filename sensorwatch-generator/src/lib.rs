//! # sensorwatch-generator
//!
//! Produces one synthetic temperature/humidity sample per interval and
//! publishes it through a [`ResilientPublisher`] that survives transport
//! outages.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sensorwatch_generator::{Backoff, GeneratorBuilder};
//! use sensorwatch_transport::MemoryQueue;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let queue = MemoryQueue::new("sensor.readings");
//!
//!     let generator = GeneratorBuilder::new()
//!         .device_id(1)
//!         .interval(Duration::from_secs(5))
//!         .backoff(Backoff::new(Duration::from_millis(1000), 2.0))
//!         .build(queue.connector());
//!
//!     // Runs until the process is terminated.
//!     generator.run().await;
//! }
//! ```
//!
//! ## Behaviour
//!
//! - Samples are only produced while connected; ticks that fall into an
//!   outage are skipped, never buffered.
//! - Reconnects retry forever with exponential backoff.
//! - Connection state changes are published on a watch channel
//!   ([`Generator::state`]).

mod backoff;
pub mod config;
mod generator;
mod publisher;

pub use backoff::Backoff;
pub use config::{ConfigError, GeneratorConfig};
pub use generator::{synth_sample, Generator, GeneratorBuilder};
pub use publisher::ResilientPublisher;
