//! Payload decoding.
//!
//! Turns one raw payload into at most one [`Reading`]. A payload that is not
//! a JSON object is an error; a well-formed object that simply does not
//! carry a numeric value for the tracked field is skipped silently, since a
//! topic may legitimately carry unrelated messages.

use serde_json::Value;

use crate::source::RawMessage;
use crate::{DecodeError, Reading};

/// Field tracked when none is configured.
pub const DEFAULT_FIELD: &str = "3T0";

/// Extracts one numeric field from JSON object payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    field: String,
}

impl PayloadDecoder {
    /// Create a decoder tracking `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// The tracked field key.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Decode a raw message.
    ///
    /// The reading is stamped with the message's receipt time.
    pub fn decode(&self, message: &RawMessage) -> Result<Option<Reading>, DecodeError> {
        self.decode_payload(&message.payload, message.received_at_ms)
    }

    /// Decode a payload received at `received_at_ms`.
    ///
    /// ```
    /// use sensorwatch::PayloadDecoder;
    ///
    /// let decoder = PayloadDecoder::new("3T0");
    /// let reading = decoder.decode_payload(br#"{"3T0": 22.5}"#, 1_000).unwrap();
    /// assert_eq!(reading.map(|r| r.value), Some(22.5));
    ///
    /// assert_eq!(decoder.decode_payload(br#"{"other": 5}"#, 1_000), Ok(None));
    /// assert!(decoder.decode_payload(b"{not json", 1_000).is_err());
    /// ```
    pub fn decode_payload(
        &self,
        payload: &[u8],
        received_at_ms: u64,
    ) -> Result<Option<Reading>, DecodeError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let object = match value {
            Value::Object(object) => object,
            other => return Err(DecodeError::NotAnObject(json_kind(&other))),
        };

        Ok(object
            .get(&self.field)
            .and_then(Value::as_f64)
            .map(|v| Reading::new(received_at_ms, v)))
    }
}

impl Default for PayloadDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_FIELD)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(payload: &str) -> Result<Option<Reading>, DecodeError> {
        PayloadDecoder::new("3T0").decode_payload(payload.as_bytes(), 42)
    }

    #[test]
    fn numeric_field_yields_reading() {
        let reading = decode(r#"{"3T0": 22.5}"#).unwrap().unwrap();
        assert_eq!(reading.value, 22.5);
        assert_eq!(reading.timestamp_ms, 42);
    }

    #[test]
    fn integer_field_is_numeric() {
        let reading = decode(r#"{"3T0": -7, "other": "x"}"#).unwrap().unwrap();
        assert_eq!(reading.value, -7.0);
    }

    #[test]
    fn string_field_is_skipped() {
        assert_eq!(decode(r#"{"3T0": "bad"}"#), Ok(None));
        assert_eq!(decode(r#"{"3T0": "22.5"}"#), Ok(None));
    }

    #[test]
    fn other_non_numeric_values_are_skipped() {
        assert_eq!(decode(r#"{"3T0": true}"#), Ok(None));
        assert_eq!(decode(r#"{"3T0": null}"#), Ok(None));
        assert_eq!(decode(r#"{"3T0": [1, 2]}"#), Ok(None));
    }

    #[test]
    fn missing_field_is_skipped() {
        assert_eq!(decode(r#"{"other": 5}"#), Ok(None));
        assert_eq!(decode("{}"), Ok(None));
    }

    #[test]
    fn field_lookup_is_exact() {
        assert_eq!(decode(r#"{"3t0": 1.0}"#), Ok(None));
        assert_eq!(decode(r#"{"nested": {"3T0": 1.0}}"#), Ok(None));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(decode("{\"3T0\": "), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(""), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn non_object_json_is_an_error() {
        assert_eq!(decode("22.5"), Err(DecodeError::NotAnObject("number")));
        assert_eq!(decode("[22.5]"), Err(DecodeError::NotAnObject("array")));
    }

    #[test]
    fn decode_uses_message_receipt_time() {
        let decoder = PayloadDecoder::default();
        let message = RawMessage::at("t", r#"{"3T0": 1.5, "ts": 5}"#, 9_000);
        let reading = decoder.decode(&message).unwrap().unwrap();
        assert_eq!(reading, Reading::new(9_000, 1.5));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let result = PayloadDecoder::default().decode_payload(&[0xff, 0xfe], 0);
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }
}
