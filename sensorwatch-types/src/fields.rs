//! Wire field names and their accepted aliases.
//!
//! Producers have shipped samples under several field names over time. Each
//! logical field has one ordered alias list; the first alias present with a
//! non-null value wins. Resolution happens once, at the normalization
//! boundary, so nothing downstream ever sees an alias name.

use serde_json::{Map, Value};

/// Field carrying the generation timestamp on the wire.
pub const WIRE_GENERATED_AT: &str = "fechaGeneración";
/// Field carrying the device identifier on the wire.
pub const WIRE_DEVICE_ID: &str = "IdDispositivo";
/// Field carrying the temperature on the wire.
pub const WIRE_TEMPERATURE: &str = "temperatura";
/// Field carrying the relative humidity on the wire.
pub const WIRE_HUMIDITY: &str = "humedad";

pub const GENERATED_AT_FIELDS: &[&str] = &[
    WIRE_GENERATED_AT,
    "fechaGeneracion",
    "generatedAt",
    "generated_at",
    "timestamp",
];

pub const DEVICE_ID_FIELDS: &[&str] = &[
    WIRE_DEVICE_ID,
    "idDispositivo",
    "deviceId",
    "device_id",
    "device",
];

pub const TEMPERATURE_FIELDS: &[&str] = &[WIRE_TEMPERATURE, "temperature", "temp"];

pub const HUMIDITY_FIELDS: &[&str] = &[WIRE_HUMIDITY, "humidity"];

pub const RECEIVED_AT_FIELDS: &[&str] = &["receivedAt", "received_at"];

pub const ID_FIELDS: &[&str] = &["id"];

/// Look up a logical field through its alias list.
///
/// Returns the first alias present with a non-null value, together with the
/// alias that matched.
pub fn resolve<'a>(object: &'a Map<String, Value>, aliases: &[&'static str]) -> Option<(&'static str, &'a Value)> {
    aliases
        .iter()
        .find_map(|alias| object.get(*alias).filter(|v| !v.is_null()).map(|v| (*alias, v)))
}
