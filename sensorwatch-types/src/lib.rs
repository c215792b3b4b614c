//! # sensorwatch-types
//!
//! Core types for the sensorwatch telemetry pipeline. This crate defines the
//! data model shared by the generator, the ingestion service and the client
//! aggregator.
//!
//! ## Sample lifecycle
//!
//! ```text
//! RawSample (wire, one per generator tick)
//!        │  parse + validate (sensorwatch-ingest)
//!        ▼
//! ValidatedSample (all fields in domain)
//!        │  persist (store assigns id + receivedAt)
//!        ▼
//! NormalizedSample (canonical, stored forever, broadcast live)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use sensorwatch_types::{DeviceId, RawSample};
//!
//! let raw = RawSample {
//!     generated_at: Some("21/12/2024 10:15:00".to_string()),
//!     device_id: Some(DeviceId::from(7)),
//!     temperature: Some(21.5),
//!     humidity: Some(48.25),
//! };
//!
//! let payload = raw.to_payload();
//! assert_eq!(payload["IdDispositivo"], 7);
//! assert_eq!(payload["temperatura"], 21.5);
//! ```

mod device;
pub mod fields;
mod sample;
mod state;

pub use device::DeviceId;
pub use sample::*;
pub use state::ConnectionState;

/// Maximum number of samples returned by a historical query.
pub const HISTORY_LIMIT: usize = 50;
