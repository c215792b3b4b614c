//! # sensorwatch-ingest
//!
//! The ingestion side of sensorwatch. Each message pulled from the
//! transport channel goes through:
//!
//! 1. **consume** - decode the payload ([`payload::parse`])
//! 2. **validate** - check every field, collecting all violations
//!    ([`validate::validate`])
//! 3. **persist** - append to a [`SampleStore`], which assigns the id and
//!    reception time
//! 4. **broadcast** - push the stored sample to live subscribers through
//!    the [`FanoutHub`]
//!
//! Persist always completes before broadcast. Malformed and invalid
//! messages are logged and dropped; store failures send the message back
//! to the transport for redelivery.
//!
//! Stored samples are served over HTTP by [`query::serve_query`] and the
//! live stream over TCP by [`hub::serve_feed`].

pub mod config;
pub mod error;
pub mod hub;
pub mod payload;
pub mod query;
mod service;
pub mod store;
pub mod validate;

pub use config::IngestConfig;
pub use error::{IngestError, ParseError, StoreError, ValidationError, Violation};
pub use hub::FanoutHub;
pub use service::{Disposition, IngestService, Rejection};
pub use store::{JsonlStore, MemoryStore, SampleStore};
