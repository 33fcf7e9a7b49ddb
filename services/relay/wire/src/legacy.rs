//! Legacy Highway dialect.
//!
//! Servers older than 0.2 speak a simpler variant: rooms are joined with
//! `join`/`leave` packets that are never acknowledged, and there is no
//! version negotiation or room information.

use crate::error::WireError;
use serde::{Deserialize, Serialize};

/// Packets sent by a legacy client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegacyClientPacket {
    /// Join a room
    Join {
        /// Room name
        room: String,
    },
    /// Leave a room
    Leave {
        /// Room name
        room: String,
    },
    /// Publish into a room
    Message {
        /// Room name
        room: String,
        /// Opaque body
        body: String,
    },
}

/// Packets sent by a legacy server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegacyServerPacket {
    /// Greeting
    Hello {},
    /// Message published into a room
    Message {
        /// Room name
        room: String,
        /// Message body
        body: serde_json::Value,
        /// Publisher, if known
        #[serde(default)]
        user: Option<String>,
    },
    /// Error report
    Error {
        /// Error description
        message: String,
    },
    /// Any packet type this client does not know
    #[serde(other)]
    Unknown,
}

impl LegacyClientPacket {
    /// Serialize to a JSON string
    pub fn encode(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl LegacyServerPacket {
    /// Parse a JSON string
    pub fn decode(packet: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(packet)?)
    }
}
