//! Client-side data model: normalization, bounded series and aggregates.

mod aggregate;
pub mod duration;
mod normalize;
mod recency;
mod series;

pub use aggregate::Aggregates;
pub use normalize::{normalize_item, normalize_message, ClientSample};
pub use recency::Recency;
pub use series::{DeviceSeries, SERIES_CAPACITY};
