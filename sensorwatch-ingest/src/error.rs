//! Error types for the ingestion pipeline.

use std::fmt;

use sensorwatch_transport::TransportError;
use thiserror::Error;

/// The payload is not a usable sample document.
///
/// Terminal: the message is consumed and never redelivered.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("field `{field}` must be {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },
}

/// One reason a parsed sample is unusable.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    MissingTimestamp,
    UnparseableTimestamp(String),
    MissingDeviceId,
    MissingTemperature,
    TemperatureOutOfRange(f64),
    MissingHumidity,
    HumidityOutOfRange(f64),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingTimestamp => f.write_str("generation timestamp is missing"),
            Violation::UnparseableTimestamp(text) => {
                write!(f, "generation timestamp `{text}` is not a recognised format")
            }
            Violation::MissingDeviceId => f.write_str("device id is missing"),
            Violation::MissingTemperature => f.write_str("temperature is missing"),
            Violation::TemperatureOutOfRange(t) => {
                write!(f, "temperature {t} is outside [-80, 120]")
            }
            Violation::MissingHumidity => f.write_str("humidity is missing"),
            Violation::HumidityOutOfRange(h) => write!(f, "humidity {h} is outside [0, 100]"),
        }
    }
}

/// Every violation found in one sample.
///
/// Terminal, like [`ParseError`].
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid sample: ")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// The persistent store could not complete an operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record on line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(serde_json::Error),
}

/// A non-terminal failure while handling a message.
///
/// These propagate to the consume loop, which hands the message back to the
/// transport for redelivery.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_violation() {
        let err = ValidationError {
            violations: vec![
                Violation::MissingDeviceId,
                Violation::TemperatureOutOfRange(150.0),
            ],
        };
        assert_eq!(
            err.to_string(),
            "invalid sample: device id is missing; temperature 150 is outside [-80, 120]"
        );
    }
}
