//! Gateway payload framing
//!
//! Every message on the gateway socket is one [`GatewayPayload`]. The relay
//! core only reads `op`, `s` and `d` (plus the Ready event type when
//! capturing the session id); `d` stays an opaque JSON value.

use super::OpCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Event type of the session-establishing dispatch
pub const READY_EVENT: &str = "READY";

/// A single gateway message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    /// Operation code
    pub op: OpCode,

    /// Event type (Dispatch only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Sequence number (Dispatch only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Inner data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl GatewayPayload {
    fn bare(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op,
            t: None,
            s: None,
            d,
        }
    }

    /// A dispatch event as the server frames it
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            t: Some(event_type.into()),
            s: Some(sequence),
            d: Some(data),
        }
    }

    /// A heartbeat carrying the last received sequence
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::bare(OpCode::Heartbeat, last_sequence.map(Into::into))
    }

    /// Session authentication
    #[must_use]
    pub fn identify(token: &str, shard_index: u32, shard_count: u32) -> Self {
        Self::bare(
            OpCode::Identify,
            Some(json!({
                "token": token,
                "shard": [shard_index, shard_count],
            })),
        )
    }

    /// Resume a dropped session
    #[must_use]
    pub fn resume(token: &str, session_id: &str, last_sequence: u64) -> Self {
        Self::bare(
            OpCode::Resume,
            Some(json!({
                "token": token,
                "session_id": session_id,
                "seq": last_sequence,
            })),
        )
    }

    /// Online status change
    #[must_use]
    pub fn presence_update(status: &str) -> Self {
        Self::bare(OpCode::PresenceUpdate, Some(json!({ "status": status })))
    }

    /// True for dispatch payloads
    #[must_use]
    pub fn is_dispatch(&self) -> bool {
        self.op == OpCode::Dispatch
    }

    /// The heartbeat interval of a Hello payload, in milliseconds
    #[must_use]
    pub fn heartbeat_interval(&self) -> Option<u64> {
        if self.op != OpCode::Hello {
            return None;
        }
        self.d.as_ref()?.get("heartbeat_interval")?.as_u64()
    }

    /// The session id of a Ready dispatch
    #[must_use]
    pub fn ready_session_id(&self) -> Option<String> {
        if !self.is_dispatch() || self.t.as_deref() != Some(READY_EVENT) {
            return None;
        }
        self.d
            .as_ref()?
            .get("session_id")?
            .as_str()
            .map(str::to_owned)
    }
}

impl std::fmt::Display for GatewayPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.t, self.s) {
            (Some(t), Some(s)) => write!(f, "op={:?} t={} s={}", self.op, t, s),
            _ => write!(f, "op={:?}", self.op),
        }
    }
}
