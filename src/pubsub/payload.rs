//! Payload encoding for the wire.
//!
//! Structured payloads travel as JSON text. On the receiving side any text
//! that does not parse as JSON is handed to subscribers unchanged as
//! [`Payload::Raw`]; a failed decode is never an error.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use triggerbus_error::PublishError;

/// A value published to, or delivered from, a trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON value; encoded as JSON text.
    Structured(Value),
    /// Text sent verbatim, or received text that was not valid JSON.
    Raw(String),
}

impl Payload {
    /// Raw text payload, published without JSON encoding.
    pub fn raw(text: impl Into<String>) -> Self {
        Payload::Raw(text.into())
    }

    /// Serializes any `Serialize` value into a structured payload.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, PublishError> {
        serde_json::to_value(value)
            .map(Payload::Structured)
            .map_err(|err| PublishError::Encode {
                reason: err.to_string(),
            })
    }

    /// Wire representation.
    pub fn encode(&self) -> String {
        match self {
            Payload::Structured(value) => value.to_string(),
            Payload::Raw(text) => text.clone(),
        }
    }

    /// Parses wire text, falling back to [`Payload::Raw`] on invalid JSON.
    pub fn decode(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => Payload::Structured(value),
            Err(_) => Payload::Raw(text.to_string()),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Structured(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }

    /// Text of a raw payload or of a structured JSON string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Structured(value) => value.as_str(),
            Payload::Raw(text) => Some(text),
        }
    }

    /// Converts into a JSON value; raw text becomes a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            Payload::Structured(value) => value,
            Payload::Raw(text) => Value::String(text),
        }
    }

    /// Deserializes the payload into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            Payload::Structured(value) => T::deserialize(value),
            Payload::Raw(text) => T::deserialize(Value::String(text.clone())),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Structured(value)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Structured(Value::String(text.to_string()))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Structured(Value::String(text))
    }
}
