//! Node control messages
//!
//! Out-of-band messages between downstream workers and the upstream leader.
//! Not correlated with any payload sequence. Unknown extra fields are
//! ignored so the schema can grow.

use serde::{Deserialize, Serialize};

/// Control operation requested of the leader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlOp {
    /// Drop and re-establish the upstream connection
    Reconnect,
    /// Close the upstream connection for good
    Close,
}

/// A control-plane message between relay nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeControl {
    pub op: ControlOp,
    pub shard_index: u32,
}

impl NodeControl {
    #[must_use]
    pub fn reconnect(shard_index: u32) -> Self {
        Self {
            op: ControlOp::Reconnect,
            shard_index,
        }
    }

    #[must_use]
    pub fn close(shard_index: u32) -> Self {
        Self {
            op: ControlOp::Close,
            shard_index,
        }
    }
}
