//! Persistent store for normalized samples.
//!
//! Stores are append-only. Identity is assigned at insert time, strictly
//! increasing and never reused, and `received_at` is stamped from the
//! ingesting process clock.

use async_trait::async_trait;
use sensorwatch_types::{DeviceId, NormalizedSample, ValidatedSample};

use crate::error::StoreError;

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

/// Durable record of every accepted sample.
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Append a sample, assigning its identity and reception time.
    async fn insert(&self, sample: ValidatedSample) -> Result<NormalizedSample, StoreError>;

    /// Most recent samples first, optionally for a single device.
    ///
    /// Ordered by `received_at` descending, ties broken by higher id first.
    async fn recent(
        &self,
        device: Option<&DeviceId>,
        limit: usize,
    ) -> Result<Vec<NormalizedSample>, StoreError>;
}

#[async_trait]
impl<S: SampleStore + ?Sized> SampleStore for std::sync::Arc<S> {
    async fn insert(&self, sample: ValidatedSample) -> Result<NormalizedSample, StoreError> {
        (**self).insert(sample).await
    }

    async fn recent(
        &self,
        device: Option<&DeviceId>,
        limit: usize,
    ) -> Result<Vec<NormalizedSample>, StoreError> {
        (**self).recent(device, limit).await
    }
}

/// Select the newest `limit` records matching `device` from an
/// arrival-ordered slice.
pub(crate) fn newest_first(
    records: &[NormalizedSample],
    device: Option<&DeviceId>,
    limit: usize,
) -> Vec<NormalizedSample> {
    let mut matching: Vec<NormalizedSample> = records
        .iter()
        .filter(|r| device.is_none_or(|d| &r.device_id == d))
        .cloned()
        .collect();
    matching.sort_by(|a, b| {
        b.received_at
            .cmp(&a.received_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    matching.truncate(limit);
    matching
}
