//! Native envelope encoding spoken at the top of every relay stack.
//!
//! ```text
//! {"type":"message","message":"hi","path":[{"type":"org","name":"Alpha"}],"user":{"name":"Nady","id":1}}
//! {"type":"event","event":{"type":"online",...},"path":[...]}
//! ```

use relay_routing::{Character, EnvelopeKind, EventPayload, Hop, RoutableEnvelope};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum NativePacket {
    Message {
        message: String,
        #[serde(default)]
        path: Vec<Hop>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<Character>,
    },
    Event {
        event: EventPayload,
        #[serde(default)]
        path: Vec<Hop>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<Character>,
    },
}

/// Serialize an envelope for a relay
pub fn encode_envelope(envelope: &RoutableEnvelope) -> Result<String, serde_json::Error> {
    let packet = match &envelope.kind {
        EnvelopeKind::Message(text) => NativePacket::Message {
            message: text.clone(),
            path: envelope.path.clone(),
            user: envelope.character.clone(),
        },
        EnvelopeKind::Event(event) => NativePacket::Event {
            event: event.clone(),
            path: envelope.path.clone(),
            user: envelope.character.clone(),
        },
    };
    serde_json::to_string(&packet)
}

/// Parse a relay payload; anything that is not a native packet is dropped
pub fn decode_envelope(payload: &str) -> Option<RoutableEnvelope> {
    let packet: NativePacket = match serde_json::from_str(payload) {
        Ok(packet) => packet,
        Err(e) => {
            debug!("Ignoring non-native relay payload: {}", e);
            return None;
        }
    };

    let (kind, path, character) = match packet {
        NativePacket::Message { message, path, user } => (EnvelopeKind::Message(message), path, user),
        NativePacket::Event { event, path, user } => (EnvelopeKind::Event(event), path, user),
    };
    Some(RoutableEnvelope {
        kind,
        path,
        character,
        route_silently: false,
    })
}
