//! Gateway operation codes

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Operation code of a gateway payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// An event dispatched by the server
    Dispatch = 0,
    /// Keep-alive, sent by either side
    Heartbeat = 1,
    /// Session authentication, sent on connect
    Identify = 2,
    /// Online status change
    PresenceUpdate = 3,
    /// Resume a dropped session
    Resume = 4,
    /// Server asks the client to reconnect
    Reconnect = 5,
    /// The session is invalid; identify again
    InvalidSession = 7,
    /// First message after connecting; carries the heartbeat interval
    Hello = 10,
    /// Heartbeat acknowledgment
    HeartbeatAck = 11,
}

impl OpCode {
    /// Decode a raw op code
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::Resume,
            5 => Self::Reconnect,
            7 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            _ => return None,
        })
    }

    /// The raw wire value
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for op codes this client may send upstream
    #[must_use]
    pub const fn sent_by_client(self) -> bool {
        matches!(
            self,
            Self::Heartbeat | Self::Identify | Self::PresenceUpdate | Self::Resume
        )
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown op code: {value}")))
    }
}
