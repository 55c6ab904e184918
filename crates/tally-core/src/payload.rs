//! Generic JSON payload handling for semi-trusted exchange responses.
//!
//! Top-level decode failures and exchange-reported error envelopes are fatal
//! [`RemoteError`]s. Per-record field extraction returns soft
//! [`NormalizationError`]s that preserve the offending key name.

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::domain::{Location, UtcDateTime};
use crate::{NormalizationError, RemoteError};

/// Decoded response body as a tagged shape.
///
/// Callers declare the shape they expect via [`Payload::expect_mapping`] /
/// [`Payload::expect_sequence`]; a mismatch is a misconfigured adapter, not
/// remote data corruption, and fails loudly.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Mapping(Map<String, Value>),
    Sequence(Vec<Value>),
    Scalar(Value),
}

impl Payload {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Mapping(_) => "mapping",
            Self::Sequence(_) => "sequence",
            Self::Scalar(_) => "scalar",
        }
    }

    /// # Panics
    ///
    /// Panics when the payload is not a JSON mapping.
    pub fn expect_mapping(self) -> Map<String, Value> {
        match self {
            Self::Mapping(map) => map,
            other => panic!("expected a JSON mapping response, got a {}", other.kind()),
        }
    }

    /// # Panics
    ///
    /// Panics when the payload is not a JSON sequence.
    pub fn expect_sequence(self) -> Vec<Value> {
        match self {
            Self::Sequence(items) => items,
            other => panic!("expected a JSON sequence response, got a {}", other.kind()),
        }
    }
}

/// Decode a response body and surface exchange-reported errors.
///
/// The error envelope shape `{"error": {"message": ...}}` is recognized
/// uniformly; a decoded mapping carrying an `error` key becomes
/// [`RemoteError::Remote`] with the nested message.
pub fn parse_response(location: Location, body: &str) -> Result<Payload, RemoteError> {
    let value: Value =
        serde_json::from_str(body).map_err(|_| RemoteError::InvalidJson { location })?;

    if let Value::Object(map) = &value {
        if let Some(error) = map.get("error") {
            return Err(RemoteError::Remote {
                location,
                message: remote_message(error),
            });
        }
    }

    Ok(match value {
        Value::Object(map) => Payload::Mapping(map),
        Value::Array(items) => Payload::Sequence(items),
        other => Payload::Scalar(other),
    })
}

fn remote_message(error: &Value) -> String {
    match error.get("message").and_then(Value::as_str) {
        Some(message) => message.to_owned(),
        // Envelope without a string message: keep whatever was sent so the
        // operator can still see it.
        None => error.to_string(),
    }
}

/// Required key lookup. Absent keys soft-fail with the key name preserved.
pub fn require<'a>(
    record: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Value, NormalizationError> {
    record
        .get(key)
        .ok_or_else(|| NormalizationError::MissingKey(key.to_owned()))
}

/// Required string field. Null counts as missing.
pub fn text_field(record: &Map<String, Value>, key: &str) -> Result<String, NormalizationError> {
    match require(record, key)? {
        Value::String(value) => Ok(value.clone()),
        Value::Null => Err(NormalizationError::MissingKey(key.to_owned())),
        other => Err(NormalizationError::Deserialization(format!(
            "expected a string for key '{key}', got '{other}'"
        ))),
    }
}

/// Optional string field: absent, null and empty values all collapse to None.
pub fn optional_text(record: &Map<String, Value>, key: &str) -> Option<String> {
    match record.get(key) {
        Some(Value::String(value)) if !value.is_empty() => Some(value.clone()),
        _ => None,
    }
}

/// Required decimal field, accepting JSON numbers and numeric strings.
pub fn decimal_field(record: &Map<String, Value>, key: &str) -> Result<Decimal, NormalizationError> {
    match require(record, key)? {
        Value::Null => Err(NormalizationError::MissingKey(key.to_owned())),
        value => decode_decimal(value, key),
    }
}

/// Optional decimal field: absent and null values collapse to None.
pub fn optional_decimal(
    record: &Map<String, Value>,
    key: &str,
) -> Result<Option<Decimal>, NormalizationError> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decode_decimal(value, key).map(Some),
    }
}

fn decode_decimal(value: &Value, key: &str) -> Result<Decimal, NormalizationError> {
    match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(Decimal::from(integer))
            } else if let Some(integer) = number.as_u64() {
                Ok(Decimal::from(integer))
            } else {
                let float = number.as_f64().ok_or_else(|| {
                    NormalizationError::Deserialization(format!(
                        "unrepresentable number for key '{key}'"
                    ))
                })?;
                Decimal::try_from(float).map_err(|_| {
                    NormalizationError::Deserialization(format!(
                        "unrepresentable number '{float}' for key '{key}'"
                    ))
                })
            }
        }
        Value::String(text) => text.trim().parse::<Decimal>().map_err(|_| {
            NormalizationError::Deserialization(format!(
                "invalid decimal '{text}' for key '{key}'"
            ))
        }),
        other => Err(NormalizationError::Deserialization(format!(
            "expected a number for key '{key}', got '{other}'"
        ))),
    }
}

/// Optional RFC3339 timestamp field: absent and null collapse to None, a
/// present but unparseable value is a soft failure.
pub fn optional_timestamp(
    record: &Map<String, Value>,
    key: &str,
) -> Result<Option<UtcDateTime>, NormalizationError> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => UtcDateTime::parse(text).map(Some).map_err(|_| {
            NormalizationError::Deserialization(format!(
                "invalid timestamp '{text}' for key '{key}'"
            ))
        }),
        Some(other) => Err(NormalizationError::Deserialization(format!(
            "expected a timestamp string for key '{key}', got '{other}'"
        ))),
    }
}

/// Required RFC3339 timestamp field.
pub fn timestamp_field(
    record: &Map<String, Value>,
    key: &str,
) -> Result<UtcDateTime, NormalizationError> {
    optional_timestamp(record, key)?.ok_or_else(|| NormalizationError::MissingKey(key.to_owned()))
}
