//! Bounded per-device sample series.

use std::collections::VecDeque;

use super::normalize::ClientSample;

/// Maximum number of samples kept per device.
pub const SERIES_CAPACITY: usize = 60;

/// The most recent samples for one device, in arrival order.
///
/// Appending beyond [`SERIES_CAPACITY`] drops the oldest sample. Order is by
/// arrival, not by generation time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSeries {
    samples: VecDeque<ClientSample>,
}

impl DeviceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample, returning the evicted one if the series was full.
    pub fn push(&mut self, sample: ClientSample) -> Option<ClientSample> {
        self.samples.push_back(sample);
        if self.samples.len() > SERIES_CAPACITY {
            self.samples.pop_front()
        } else {
            None
        }
    }

    pub fn contains_id(&self, id: u64) -> bool {
        self.samples.iter().any(|s| s.id == Some(id))
    }

    pub fn latest(&self) -> Option<&ClientSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Temperatures in arrival order, `None` where the sample had no value.
    pub fn temperatures(&self) -> Vec<Option<f64>> {
        self.samples.iter().map(|s| s.temperature).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorwatch_types::DeviceId;

    fn sample(id: u64) -> ClientSample {
        ClientSample {
            id: Some(id),
            device_id: DeviceId::from(1),
            generated_at: None,
            received_at: None,
            temperature: Some(id as f64),
            humidity: None,
        }
    }

    #[test]
    fn keeps_the_sixty_most_recent() {
        let mut series = DeviceSeries::new();
        let mut evicted = Vec::new();
        for id in 1..=65 {
            if let Some(old) = series.push(sample(id)) {
                evicted.push(old.id.unwrap());
            }
        }
        assert_eq!(series.len(), SERIES_CAPACITY);
        let ids: Vec<u64> = series.iter().map(|s| s.id.unwrap()).collect();
        assert_eq!(ids, (6..=65).collect::<Vec<_>>());
        assert_eq!(evicted, vec![1, 2, 3, 4, 5]);
        assert_eq!(series.latest().unwrap().id, Some(65));
    }

    #[test]
    fn value_vectors_follow_arrival_order() {
        let mut series = DeviceSeries::new();
        series.push(sample(3));
        series.push(sample(1));
        assert_eq!(series.temperatures(), vec![Some(3.0), Some(1.0)]);
        assert!(series.contains_id(1));
        assert!(!series.contains_id(2));
    }
}
