//! Wire payload decoding.

use sensorwatch_types::fields::{
    self, DEVICE_ID_FIELDS, GENERATED_AT_FIELDS, HUMIDITY_FIELDS, TEMPERATURE_FIELDS,
};
use sensorwatch_types::{DeviceId, RawSample};
use serde_json::{Map, Value};

use crate::error::ParseError;

/// Decode a textual payload into a [`RawSample`].
///
/// Field names are resolved through the alias tables in
/// [`sensorwatch_types::fields`]; unknown fields are ignored. A missing or
/// `null` field simply leaves the corresponding value empty (validation
/// decides whether that is acceptable), but a field of the wrong JSON type
/// makes the whole document unusable.
///
/// ```rust
/// use sensorwatch_ingest::payload::parse;
///
/// let raw = parse(r#"{"deviceId": 4, "temp": 19.5, "humedad": 40}"#).unwrap();
/// assert_eq!(raw.device_id.unwrap().as_str(), "4");
/// assert_eq!(raw.temperature, Some(19.5));
/// assert!(raw.generated_at.is_none());
///
/// assert!(parse(r#"{"temperatura": 21.0"#).is_err());
/// ```
pub fn parse(text: &str) -> Result<RawSample, ParseError> {
    let document: Value = serde_json::from_str(text)?;
    parse_value(&document)
}

/// [`parse`] for raw bytes; invalid UTF-8 is reported as malformed JSON.
pub fn parse_bytes(payload: &[u8]) -> Result<RawSample, ParseError> {
    let document: Value = serde_json::from_slice(payload)?;
    parse_value(&document)
}

fn parse_value(document: &Value) -> Result<RawSample, ParseError> {
    let object = match document {
        Value::Object(object) => object,
        other => return Err(ParseError::NotAnObject(kind(other))),
    };
    Ok(RawSample {
        generated_at: text_field(object, GENERATED_AT_FIELDS)?,
        device_id: device_field(object)?,
        temperature: number_field(object, TEMPERATURE_FIELDS)?,
        humidity: number_field(object, HUMIDITY_FIELDS)?,
    })
}

fn text_field(
    object: &Map<String, Value>,
    aliases: &[&'static str],
) -> Result<Option<String>, ParseError> {
    match fields::resolve(object, aliases) {
        None => Ok(None),
        Some((_, Value::String(s))) => Ok(Some(s.clone())),
        Some((field, _)) => Err(ParseError::TypeMismatch {
            field,
            expected: "a string",
        }),
    }
}

fn number_field(
    object: &Map<String, Value>,
    aliases: &[&'static str],
) -> Result<Option<f64>, ParseError> {
    match fields::resolve(object, aliases) {
        None => Ok(None),
        Some((field, value)) => value.as_f64().map(Some).ok_or(ParseError::TypeMismatch {
            field,
            expected: "a number",
        }),
    }
}

fn device_field(object: &Map<String, Value>) -> Result<Option<DeviceId>, ParseError> {
    match fields::resolve(object, DEVICE_ID_FIELDS) {
        None => Ok(None),
        // A blank string is a missing id, reported by validation.
        Some((_, Value::String(s))) => Ok(DeviceId::new(s)),
        Some((field, value)) => DeviceId::from_json(value)
            .map(Some)
            .ok_or(ParseError::TypeMismatch {
                field,
                expected: "an integer or a string",
            }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        let raw = parse(
            r#"{"fechaGeneración":"21/12/2024 10:15:00","IdDispositivo":7,"temperatura":21.5,"humedad":48.25}"#,
        )
        .unwrap();
        assert_eq!(raw.generated_at.as_deref(), Some("21/12/2024 10:15:00"));
        assert_eq!(raw.device_id, Some(DeviceId::from(7)));
        assert_eq!(raw.temperature, Some(21.5));
        assert_eq!(raw.humidity, Some(48.25));
    }

    #[test]
    fn null_falls_through_to_next_alias() {
        let raw = parse(r#"{"IdDispositivo":null,"device_id":"lab-2","temperature":20}"#).unwrap();
        assert_eq!(raw.device_id.unwrap().as_str(), "lab-2");
        assert_eq!(raw.temperature, Some(20.0));
    }

    #[test]
    fn missing_and_null_fields_stay_empty() {
        let raw = parse(r#"{"temperatura":null,"extra":"ignored"}"#).unwrap();
        assert_eq!(raw, RawSample::default());
    }

    #[test]
    fn blank_device_id_is_left_for_validation() {
        let raw = parse(r#"{"IdDispositivo":"   "}"#).unwrap();
        assert!(raw.device_id.is_none());
    }

    #[test]
    fn truncated_document_is_malformed() {
        assert!(matches!(
            parse(r#"{"IdDispositivo": 1, "temperatura": 2"#),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn non_object_documents_are_rejected() {
        assert!(matches!(parse("[1,2]"), Err(ParseError::NotAnObject("an array"))));
        assert!(matches!(parse("42"), Err(ParseError::NotAnObject("a number"))));
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(matches!(
            parse(r#"{"temperatura":"hot"}"#),
            Err(ParseError::TypeMismatch {
                field: "temperatura",
                ..
            })
        ));
        assert!(matches!(
            parse(r#"{"deviceId":2.5}"#),
            Err(ParseError::TypeMismatch {
                field: "deviceId",
                ..
            })
        ));
        assert!(matches!(
            parse(r#"{"timestamp":12345}"#),
            Err(ParseError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn bytes_and_text_agree() {
        let text = r#"{"IdDispositivo":3,"humedad":55.5}"#;
        assert_eq!(parse(text).unwrap(), parse_bytes(text.as_bytes()).unwrap());
        assert!(matches!(
            parse_bytes(&[0xff, 0xfe]),
            Err(ParseError::Malformed(_))
        ));
    }
}
