//! Device identifiers.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Canonical device identifier.
///
/// Devices announce themselves with an integer on the wire, but the
/// identifier is kept in its canonical textual form so that string ids
/// from other producers can share the same pipeline. The canonical form
/// is never blank and carries no surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device id from text. Returns `None` for blank input.
    pub fn new(id: impl AsRef<str>) -> Option<Self> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Resolve a device id from a JSON value.
    ///
    /// Integers and non-blank strings are accepted; anything else yields `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Self::from)
                .or_else(|| n.as_u64().map(|v| Self(v.to_string()))),
            Value::String(s) => Self::new(s),
            _ => None,
        }
    }

    /// JSON representation used on the wire: an integer when the id is
    /// numeric, a string otherwise.
    pub fn to_json(&self) -> Value {
        match self.0.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::from(self.0.clone()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! numeric_device_id {
    ($($int:ty),*) => {
        $(
            impl From<$int> for DeviceId {
                fn from(id: $int) -> Self {
                    Self(id.to_string())
                }
            }
        )*
    };
}

numeric_device_id!(i32, i64, u32, u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        DeviceId::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom("device id must be an integer or a non-blank string"))
    }
}
