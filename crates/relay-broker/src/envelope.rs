//! Topic message framing
//!
//! Each topic message carries exactly one payload or control message plus
//! the shard key for partitioning. Unknown fields are ignored on decode.

use relay_gateway::{GatewayPayload, NodeControl};
use serde::{Deserialize, Serialize};

/// One gateway payload on the payload topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadEnvelope {
    /// Partition key, conventionally `"<shardIndex>:<shardCount>"`
    pub key: String,
    pub payload: GatewayPayload,
}

impl PayloadEnvelope {
    #[must_use]
    pub fn new(key: impl Into<String>, payload: GatewayPayload) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}

/// One control message on the control topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEnvelope {
    pub key: String,
    pub control: NodeControl,
}

impl ControlEnvelope {
    #[must_use]
    pub fn new(key: impl Into<String>, control: NodeControl) -> Self {
        Self {
            key: key.into(),
            control,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_envelope_roundtrip() {
        let envelope = PayloadEnvelope::new(
            "0:1",
            GatewayPayload::dispatch("MESSAGE_CREATE", 3, json!({"id": "5"})),
        );
        let text = serde_json::to_string(&envelope).unwrap();
        let parsed: PayloadEnvelope = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed, envelope);
        assert_eq!(parsed.key, "0:1");
    }

    #[test]
    fn test_control_envelope_roundtrip() {
        let envelope = ControlEnvelope::new("2:8", NodeControl::reconnect(2));
        let text = serde_json::to_string(&envelope).unwrap();
        let parsed: ControlEnvelope = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed, envelope);
    }

    #[test]
    fn test_extra_fields_tolerated() {
        let parsed: ControlEnvelope = serde_json::from_str(
            r#"{"key":"0:1","control":{"op":"CLOSE","shard_index":0},"publisher":"leader-a"}"#,
        )
        .unwrap();
        assert_eq!(parsed.control, NodeControl::close(0));
    }
}
