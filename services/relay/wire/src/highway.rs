//! Highway room protocol packets.
//!
//! Highway is a JSON protocol spoken over a websocket. Clients subscribe to
//! rooms and publish message bodies into them; the server fans messages out
//! to every other subscriber of the room.
//!
//! ```text
//! client -> server   {"type":"command","cmd":"subscribe","room":"..."}
//!                    {"type":"message","room":"...","body":"..."}
//! server -> client   {"type":"hello","publicRooms":[...],"config":{...}}
//!                    {"type":"room_info","room":"...","readOnly":false,...}
//!                    {"type":"message","room":"...","body":"..."}
//!                    {"type":"success","message":"...","id":"..."}
//!                    {"type":"error","message":"..."}
//! ```

use crate::error::WireError;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// Handshake response header carrying the server's protocol version
pub const VERSION_HEADER: &str = "x-highway-version";

/// Version ranges this client can speak
pub const SUPPORTED_VERSIONS: &[&str] = &["^0.2", "^0.3"];

/// Room commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighwayCommand {
    /// Join a room
    Subscribe,
    /// Leave a room
    Unsubscribe,
}

/// Packets sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientPacket {
    /// Room command
    Command {
        /// Command to run
        cmd: HighwayCommand,
        /// Target room
        room: String,
    },
    /// Publish a body into a room
    Message {
        /// Target room
        room: String,
        /// Opaque body
        body: String,
    },
}

/// Packets sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerPacket {
    /// Greeting sent right after connecting
    Hello {
        /// Rooms anyone may join
        #[serde(default, rename = "publicRooms")]
        public_rooms: Vec<String>,
        /// Server configuration
        #[serde(default)]
        config: serde_json::Value,
    },
    /// Information about a subscribed room
    RoomInfo {
        /// Room name
        room: String,
        /// Whether publishing is refused
        #[serde(default, rename = "readOnly")]
        read_only: bool,
        /// Current subscribers
        #[serde(default)]
        users: Vec<serde_json::Value>,
        /// Server-side rate limits for the room
        #[serde(default, rename = "rateLimits")]
        rate_limits: Option<serde_json::Value>,
    },
    /// Message published into a room
    Message {
        /// Room name
        room: String,
        /// Message body
        body: serde_json::Value,
        /// Publisher, if the server reveals it
        #[serde(default)]
        user: Option<String>,
    },
    /// Positive reply to the last command
    Success {
        /// Human readable message
        #[serde(default)]
        message: Option<String>,
        /// Command id, if any
        #[serde(default)]
        id: Option<serde_json::Value>,
    },
    /// Negative reply to the last command, or a general error
    Error {
        /// Error description
        message: String,
    },
    /// Any packet type this client does not know
    #[serde(other)]
    Unknown,
}

impl ClientPacket {
    /// Build a subscribe command
    pub fn subscribe(room: impl Into<String>) -> Self {
        ClientPacket::Command {
            cmd: HighwayCommand::Subscribe,
            room: room.into(),
        }
    }

    /// Build an unsubscribe command
    pub fn unsubscribe(room: impl Into<String>) -> Self {
        ClientPacket::Command {
            cmd: HighwayCommand::Unsubscribe,
            room: room.into(),
        }
    }

    /// Serialize to a JSON string
    pub fn encode(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerPacket {
    /// Parse a JSON string
    pub fn decode(packet: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(packet)?)
    }
}

/// Turn a message body into the string carried up the stack
pub fn body_to_text(body: serde_json::Value) -> String {
    match body {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Validate a negotiated version against [`SUPPORTED_VERSIONS`]
pub fn check_version(version: &str) -> Result<Version, WireError> {
    let cleaned = version.trim().trim_start_matches('v');
    let parsed = Version::parse(cleaned)
        .map_err(|_| WireError::Version(version.to_string()))?;

    let accepted = SUPPORTED_VERSIONS.iter().any(|range| {
        VersionReq::parse(range)
            .map(|req| req.matches(&parsed))
            .unwrap_or(false)
    });

    if accepted {
        Ok(parsed)
    } else {
        Err(WireError::Version(version.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_packet_shapes() {
        let sub = ClientPacket::subscribe("alliance").encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&sub).unwrap();
        assert_eq!(value["type"], "command");
        assert_eq!(value["cmd"], "subscribe");
        assert_eq!(value["room"], "alliance");

        let msg = ClientPacket::Message {
            room: "alliance".into(),
            body: "hi".into(),
        }
        .encode()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["body"], "hi");
    }

    #[test]
    fn test_server_packets() {
        let hello = ServerPacket::decode(r#"{"type":"hello","publicRooms":["a","b"],"config":{}}"#).unwrap();
        assert!(matches!(hello, ServerPacket::Hello { ref public_rooms, .. } if public_rooms.len() == 2));

        let info = ServerPacket::decode(
            r#"{"type":"room_info","room":"a","readOnly":true,"users":["x"],"rateLimits":{"messages":10}}"#,
        )
        .unwrap();
        assert!(matches!(info, ServerPacket::RoomInfo { read_only: true, .. }));

        let msg = ServerPacket::decode(r#"{"type":"message","room":"a","body":"payload"}"#).unwrap();
        match msg {
            ServerPacket::Message { room, body, user } => {
                assert_eq!(room, "a");
                assert_eq!(body_to_text(body), "payload");
                assert_eq!(user, None);
            }
            other => panic!("unexpected packet {:?}", other),
        }

        let ok = ServerPacket::decode(r#"{"type":"success","message":"subscribed","id":"42"}"#).unwrap();
        assert!(matches!(ok, ServerPacket::Success { .. }));
    }

    #[test]
    fn test_unknown_type_ignored() {
        let packet = ServerPacket::decode(r#"{"type":"future_thing","x":1}"#).unwrap();
        assert_eq!(packet, ServerPacket::Unknown);
    }

    #[test]
    fn test_malformed_packet() {
        assert!(matches!(ServerPacket::decode("not json"), Err(WireError::Malformed(_))));
        assert!(ServerPacket::decode(r#"{"type":"message"}"#).is_err());
    }

    #[test]
    fn test_object_body() {
        assert_eq!(body_to_text(serde_json::json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_version_whitelist() {
        assert!(check_version("0.2.1").is_ok());
        assert!(check_version("v0.3.0").is_ok());
        assert!(check_version("0.1.9").is_err());
        assert!(check_version("1.0.0").is_err());
        assert!(check_version("garbage").is_err());
    }
}
