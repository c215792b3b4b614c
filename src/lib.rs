//! # sensorwatch
//!
//! Client-side aggregator for the sensorwatch telemetry pipeline.
//!
//! A client fetches a historical snapshot from the query server, subscribes
//! to the live feed, and maintains bounded per-device series plus derived
//! aggregates and connectivity status, ready for a renderer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Client                            │
//! │  ┌──────────────┐                                            │
//! │  │ HistoryClient│──┐ Snapshot / HistoryFailed                │
//! │  └──────────────┘  │                                         │
//! │                    ▼                                         │
//! │  ┌──────────────┐ Update  ┌────────────┐  Arc<View> ┌──────┐ │
//! │  │LiveSubscriber│───────▶│ aggregator │──────────▶│watch │ │
//! │  └──────────────┘ (mpsc)  │ (1 writer) │            └──────┘ │
//! │                    ▲      └────────────┘                     │
//! │        1s Tick ────┘                                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: the historical HTTP fetch and the reconnecting live
//!   feed subscriber
//! - **[`data`]**: tolerant normalization, [`DeviceSeries`] (60 samples,
//!   FIFO eviction), [`Aggregates`] and [`Recency`] buckets
//! - **[`aggregator`]**: the single-writer state and the published
//!   [`AggregatorView`]
//!
//! A sample delivered by both the snapshot and the live feed appears twice
//! unless [`DedupPolicy::ById`] is selected.
//!
//! ## Usage
//!
//! ```no_run
//! use sensorwatch::{Client, ClientConfig};
//!
//! # tokio_test::block_on(async {
//! let client = Client::start(ClientConfig::default()).unwrap();
//! let mut view = client.view();
//! while view.changed().await.is_ok() {
//!     let view = view.borrow().clone();
//!     println!("{} devices, live: {}", view.series.len(), view.status.live);
//! }
//! # });
//! ```

pub mod aggregator;
mod client;
pub mod data;
mod error;
pub mod source;

pub use aggregator::{
    Aggregator, AggregatorBuilder, AggregatorState, AggregatorView, DedupPolicy, HistoryStatus,
    Status, Update,
};
pub use client::{Client, ClientConfig};
pub use data::{Aggregates, ClientSample, DeviceSeries, Recency, SERIES_CAPACITY};
pub use error::ClientError;
