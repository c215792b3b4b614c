//! Tolerant normalization of samples received by the client.
//!
//! Unlike ingestion, nothing here rejects a record for bad values: a
//! missing, non-numeric or non-finite value simply becomes `None`. Only an
//! item with no usable device id is skipped, since it cannot be assigned to
//! a series.

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, TimeZone, Utc};
use sensorwatch_types::fields::{
    self, DEVICE_ID_FIELDS, GENERATED_AT_FIELDS, HUMIDITY_FIELDS, ID_FIELDS, RECEIVED_AT_FIELDS,
    TEMPERATURE_FIELDS,
};
use sensorwatch_types::{DeviceId, LOCAL_TIMESTAMP_FORMAT};
use serde_json::{Map, Value};
use tracing::debug;

/// A sample as held by the client, with every value optional.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSample {
    pub id: Option<u64>,
    pub device_id: DeviceId,
    pub generated_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl ClientSample {
    /// When the sample was last seen by the pipeline: reception time if
    /// known, else generation time.
    pub fn seen_at(&self) -> Option<DateTime<Utc>> {
        self.received_at.or(self.generated_at)
    }
}

/// Normalize one live message, which may hold a single sample or an array.
pub fn normalize_message(message: &Value) -> Vec<ClientSample> {
    match message {
        Value::Array(items) => items.iter().filter_map(normalize_item).collect(),
        item => normalize_item(item).into_iter().collect(),
    }
}

/// Normalize one item; `None` if it is not an object or has no device id.
pub fn normalize_item(item: &Value) -> Option<ClientSample> {
    let Some(object) = item.as_object() else {
        debug!(item = %item, "Skipping non-object sample");
        return None;
    };
    let Some(device_id) = fields::resolve(object, DEVICE_ID_FIELDS)
        .and_then(|(_, value)| DeviceId::from_json(value))
    else {
        debug!(item = %item, "Skipping sample without device id");
        return None;
    };

    Some(ClientSample {
        id: fields::resolve(object, ID_FIELDS).and_then(|(_, v)| v.as_u64()),
        device_id,
        generated_at: timestamp(object, GENERATED_AT_FIELDS),
        received_at: timestamp(object, RECEIVED_AT_FIELDS),
        temperature: number(object, TEMPERATURE_FIELDS),
        humidity: number(object, HUMIDITY_FIELDS),
    })
}

/// A finite number, or a string that parses to one.
fn number(object: &Map<String, Value>, aliases: &[&'static str]) -> Option<f64> {
    let value = match fields::resolve(object, aliases)?.1 {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn timestamp(object: &Map<String, Value>, aliases: &[&'static str]) -> Option<DateTime<Utc>> {
    let text = fields::resolve(object, aliases)?.1.as_str()?.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(text, LOCAL_TIMESTAMP_FORMAT).ok()?;
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(at) | LocalResult::Ambiguous(at, _) => Some(at.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}
