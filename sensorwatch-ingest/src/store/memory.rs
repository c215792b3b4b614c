use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use sensorwatch_types::{DeviceId, NormalizedSample, ValidatedSample};

use super::{newest_first, SampleStore};
use crate::error::StoreError;

/// Volatile store held in process memory.
///
/// Can be switched unavailable to simulate an outage; every operation then
/// fails with [`StoreError::Unavailable`].
#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<Vec<NormalizedSample>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleStore for MemoryStore {
    async fn insert(&self, sample: ValidatedSample) -> Result<NormalizedSample, StoreError> {
        self.check()?;
        let mut records = self.records.write();
        let id = records.last().map_or(1, |r| r.id + 1);
        let record = NormalizedSample::from_validated(id, sample, Utc::now());
        records.push(record.clone());
        Ok(record)
    }

    async fn recent(
        &self,
        device: Option<&DeviceId>,
        limit: usize,
    ) -> Result<Vec<NormalizedSample>, StoreError> {
        self.check()?;
        Ok(newest_first(&self.records.read(), device, limit))
    }
}
