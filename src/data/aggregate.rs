//! Aggregates derived from every series.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sensorwatch_types::DeviceId;

use super::recency::Recency;
use super::series::DeviceSeries;

/// Summary values recomputed from the full in-memory state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    /// Mean over every present temperature in every series.
    pub mean_temperature: Option<f64>,
    pub mean_humidity: Option<f64>,
    /// Newest reception (or generation) time across all series.
    pub last_sample_at: Option<DateTime<Utc>>,
    pub sample_count: usize,
}

impl Aggregates {
    pub fn compute(series: &BTreeMap<DeviceId, DeviceSeries>) -> Self {
        let samples = || series.values().flat_map(DeviceSeries::iter);
        Self {
            mean_temperature: mean(samples().filter_map(|s| s.temperature)),
            mean_humidity: mean(samples().filter_map(|s| s.humidity)),
            last_sample_at: samples().filter_map(|s| s.seen_at()).max(),
            sample_count: samples().count(),
        }
    }

    /// Bucketed time since the last sample, as of `now`.
    ///
    /// A sample stamped in the future (clock skew) counts as just now.
    pub fn recency(&self, now: DateTime<Utc>) -> Option<Recency> {
        let last = self.last_sample_at?;
        let elapsed = (now - last).to_std().unwrap_or_default();
        Some(Recency::from_elapsed(elapsed))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
