//! Wire formats of test traffic
//!
//! Outbound messages and their echoes are JSON documents whose field names
//! are fixed by the tool's published format, hence the explicit renames.

use crate::{
    defaults::{PAYLOAD_TEXT, RETURN_SUFFIX},
    error::{AppError, Result},
};
use serde::{Deserialize, Serialize};

/// One unit of test traffic as published on the base topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// ISO-8601 UTC publish time with millisecond precision
    #[serde(rename = "PublishDateTimeUTC")]
    pub publish_date_time_utc: String,

    /// Monotonic send stamp in seconds
    #[serde(rename = "SendTime")]
    pub send_time: f64,

    /// Sequential index, starting at 1
    #[serde(rename = "MessageIndex")]
    pub message_index: u32,

    /// Filler payload of the configured length
    #[serde(rename = "Data")]
    pub data: String,
}

impl OutboundMessage {
    pub fn new(message_index: u32, publish_date_time_utc: String, send_time: f64, data: String) -> Self {
        Self {
            publish_date_time_utc,
            send_time,
            message_index,
            data,
        }
    }

    /// Serialize to the JSON body sent on the wire
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Round-trip envelope re-published on `<topic>/return`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoMessage {
    /// Monotonic stamp taken when the original was received
    #[serde(rename = "SendTime")]
    pub send_time: f64,

    /// The original JSON body, embedded as a string
    #[serde(rename = "OriginalPayload")]
    pub original_payload: String,

    #[serde(rename = "RoundTrip")]
    pub round_trip: bool,
}

impl EchoMessage {
    pub fn new(receive_time: f64, original_payload: String) -> Self {
        Self {
            send_time: receive_time,
            original_payload,
            round_trip: true,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    /// A message as originally published
    Original(OutboundMessage),
    /// An echo envelope carrying the original
    Echo {
        echo: EchoMessage,
        original: OutboundMessage,
    },
}

impl InboundPayload {
    /// Decode a raw payload, accepting both originals and echo envelopes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| AppError::parse(format!("Payload is not UTF-8: {}", e)))?;
        let value: serde_json::Value = serde_json::from_str(text)?;

        if value.get("OriginalPayload").is_some() {
            let echo: EchoMessage = serde_json::from_value(value)?;
            let original: OutboundMessage = serde_json::from_str(&echo.original_payload)?;
            Ok(InboundPayload::Echo { echo, original })
        } else {
            Ok(InboundPayload::Original(serde_json::from_value(value)?))
        }
    }

    /// The original message regardless of envelope
    pub fn original(&self) -> &OutboundMessage {
        match self {
            InboundPayload::Original(message) => message,
            InboundPayload::Echo { original, .. } => original,
        }
    }
}

/// Derived echo sub-topic for a base topic
pub fn return_topic(topic: &str) -> String {
    format!("{}/{}", topic, RETURN_SUFFIX)
}

/// Whether an inbound topic is an echo sub-topic
pub fn is_return_topic(topic: &str) -> bool {
    topic.rsplit('/').next() == Some(RETURN_SUFFIX)
}

/// Build the `Data` field: the payload text truncated, or cycled to pad
pub fn build_payload_data(length: usize) -> String {
    PAYLOAD_TEXT
        .chars()
        .chain(std::iter::once(' '))
        .cycle()
        .take(length)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_wire_field_names() {
        let message = OutboundMessage::new(7, "2024-01-01T00:00:00.000+00:00".to_string(), 12.5, "Lorem".to_string());
        let json: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        assert_eq!(json["MessageIndex"], 7);
        assert_eq!(json["SendTime"], 12.5);
        assert_eq!(json["Data"], "Lorem");
        assert_eq!(json["PublishDateTimeUTC"], "2024-01-01T00:00:00.000+00:00");
    }

    #[test]
    fn test_decode_original() {
        let body = r#"{"PublishDateTimeUTC":"t","SendTime":1.0,"MessageIndex":3,"Data":"x"}"#;
        let decoded = InboundPayload::decode(body.as_bytes()).unwrap();

        assert!(matches!(decoded, InboundPayload::Original(_)));
        assert_eq!(decoded.original().message_index, 3);
    }

    #[test]
    fn test_decode_echo_envelope() {
        let original = OutboundMessage::new(4, "t".to_string(), 2.0, "x".to_string());
        let echo = EchoMessage::new(2.5, original.to_json().unwrap());
        let decoded = InboundPayload::decode(echo.to_json().unwrap().as_bytes()).unwrap();

        match decoded {
            InboundPayload::Echo { echo, original } => {
                assert!(echo.round_trip);
                assert_eq!(echo.send_time, 2.5);
                assert_eq!(original.message_index, 4);
            }
            other => panic!("expected echo, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_foreign_payloads() {
        assert!(InboundPayload::decode(b"hello").is_err());
        assert!(InboundPayload::decode(br#"{"MessageIndex":"one"}"#).is_err());
        assert!(InboundPayload::decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_return_topic() {
        assert_eq!(return_topic("load/test"), "load/test/return");
        assert!(is_return_topic("load/test/return"));
        assert!(!is_return_topic("load/test"));
        assert!(!is_return_topic("load/returned"));
    }

    #[test]
    fn test_payload_data_truncates_and_pads() {
        assert_eq!(build_payload_data(5), "Lorem");
        assert_eq!(build_payload_data(0), "");

        let padded = build_payload_data(55);
        assert_eq!(padded.len(), 55);
        assert!(padded.starts_with("Lorem ipsum dolor sit amet Lorem"));
    }
}
