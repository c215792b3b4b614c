//! Sample types, from wire form to canonical form.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fields::{WIRE_DEVICE_ID, WIRE_GENERATED_AT, WIRE_HUMIDITY, WIRE_TEMPERATURE};
use crate::DeviceId;

/// Accepted temperature domain, in degrees Celsius (inclusive).
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = -80.0..=120.0;

/// Accepted relative humidity domain, in percent (inclusive).
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 0.0..=100.0;

/// Local-time pattern generators use for the generation timestamp
/// (`dd/MM/yyyy HH:mm:ss`, no zone information).
pub const LOCAL_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// A sample as it travels over the transport channel.
///
/// Every field is optional: a producer may omit or null any of them, and it
/// is the ingestion service's job to decide whether the sample is usable.
/// The generation timestamp is kept as text because producers emit it in
/// more than one format.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSample {
    pub generated_at: Option<String>,
    pub device_id: Option<DeviceId>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl RawSample {
    /// Serialize to the wire payload, using the canonical wire field names.
    ///
    /// Absent fields are omitted rather than written as `null`.
    pub fn to_payload(&self) -> Value {
        let mut object = Map::new();
        if let Some(ts) = &self.generated_at {
            object.insert(WIRE_GENERATED_AT.to_string(), Value::from(ts.clone()));
        }
        if let Some(id) = &self.device_id {
            object.insert(WIRE_DEVICE_ID.to_string(), id.to_json());
        }
        if let Some(t) = self.temperature {
            object.insert(WIRE_TEMPERATURE.to_string(), Value::from(t));
        }
        if let Some(h) = self.humidity {
            object.insert(WIRE_HUMIDITY.to_string(), Value::from(h));
        }
        Value::Object(object)
    }
}

/// A sample that passed validation but has not been persisted yet.
///
/// All values are within their domains and the timestamp has been resolved
/// to an absolute instant. Identity and `received_at` are assigned by the
/// store.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSample {
    pub generated_at: DateTime<Utc>,
    pub device_id: DeviceId,
    pub temperature: f64,
    pub humidity: f64,
}

/// Canonical, persisted sample.
///
/// This is also the shape served by the historical query and pushed on the
/// live feed. `received_at` is taken from the ingesting process clock and is
/// independent of `generated_at`; skew between the two is not corrected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSample {
    /// Store-assigned identity, strictly increasing, never reused.
    pub id: u64,
    pub generated_at: DateTime<Utc>,
    pub device_id: DeviceId,
    pub temperature: f64,
    pub humidity: f64,
    pub received_at: DateTime<Utc>,
}

impl NormalizedSample {
    /// Attach the store-assigned identity and reception time.
    pub fn from_validated(id: u64, sample: ValidatedSample, received_at: DateTime<Utc>) -> Self {
        Self {
            id,
            generated_at: sample.generated_at,
            device_id: sample.device_id,
            temperature: sample.temperature,
            humidity: sample.humidity,
            received_at,
        }
    }
}
