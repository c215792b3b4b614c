//! Sample validation and timestamp normalization.

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, TimeZone, Utc};
use sensorwatch_types::{
    RawSample, ValidatedSample, HUMIDITY_RANGE, LOCAL_TIMESTAMP_FORMAT, TEMPERATURE_RANGE,
};

use crate::error::{ValidationError, Violation};

/// Resolve a generation timestamp to an absolute instant.
///
/// RFC 3339 text is tried first. Failing that, the text is read as
/// `dd/MM/yyyy HH:mm:ss` in this process's local time zone.
pub fn normalize_timestamp(text: &str) -> Option<DateTime<Utc>> {
    normalize_timestamp_in(text, &Local)
}

/// [`normalize_timestamp`] with an explicit zone for the local pattern.
///
/// A local time that falls into a DST gap does not exist and fails; one
/// that occurs twice resolves to the earlier instant.
pub fn normalize_timestamp_in<Tz: TimeZone>(text: &str, zone: &Tz) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(text, LOCAL_TIMESTAMP_FORMAT).ok()?;
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(at) => Some(at.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// Check every field of `raw`, collecting all violations.
pub fn validate(raw: &RawSample) -> Result<ValidatedSample, ValidationError> {
    validate_in(raw, &Local)
}

/// [`validate`] with an explicit zone for local-pattern timestamps.
pub fn validate_in<Tz: TimeZone>(
    raw: &RawSample,
    zone: &Tz,
) -> Result<ValidatedSample, ValidationError> {
    let mut violations = Vec::new();

    let generated_at = match raw.generated_at.as_deref().map(str::trim) {
        None | Some("") => {
            violations.push(Violation::MissingTimestamp);
            None
        }
        Some(text) => {
            let instant = normalize_timestamp_in(text, zone);
            if instant.is_none() {
                violations.push(Violation::UnparseableTimestamp(text.to_string()));
            }
            instant
        }
    };

    if raw.device_id.is_none() {
        violations.push(Violation::MissingDeviceId);
    }

    match raw.temperature {
        None => violations.push(Violation::MissingTemperature),
        Some(t) if !TEMPERATURE_RANGE.contains(&t) => {
            violations.push(Violation::TemperatureOutOfRange(t))
        }
        Some(_) => {}
    }

    match raw.humidity {
        None => violations.push(Violation::MissingHumidity),
        Some(h) if !HUMIDITY_RANGE.contains(&h) => violations.push(Violation::HumidityOutOfRange(h)),
        Some(_) => {}
    }

    match (generated_at, &raw.device_id, raw.temperature, raw.humidity) {
        (Some(generated_at), Some(device_id), Some(temperature), Some(humidity))
            if violations.is_empty() =>
        {
            Ok(ValidatedSample {
                generated_at,
                device_id: device_id.clone(),
                temperature,
                humidity,
            })
        }
        _ => Err(ValidationError { violations }),
    }
}
