//! Legacy Highway layer.
//!
//! Joins are fire and forget, so the layer is ready as soon as it starts.

use crate::error::LayerError;
use crate::layer::{Decoded, LayerInit, LinkInfo, RelayLayer};
use relay_wire::{body_to_text, LegacyClientPacket, LegacyServerPacket};
use tracing::{debug, warn};

/// Adapter for servers that predate version negotiation
#[derive(Debug)]
pub struct LegacyHighwayLayer {
    rooms: Vec<String>,
    link: String,
    joined: bool,
}

impl LegacyHighwayLayer {
    /// Create a layer that joins `rooms`
    pub fn new(rooms: Vec<String>) -> Self {
        Self {
            rooms,
            link: String::new(),
            joined: false,
        }
    }

    fn room_packets(&self, build: fn(String) -> LegacyClientPacket) -> Vec<String> {
        self.rooms
            .iter()
            .filter_map(|room| build(room.clone()).encode().ok())
            .collect()
    }
}

impl RelayLayer for LegacyHighwayLayer {
    fn name(&self) -> &'static str {
        "highway-legacy"
    }

    fn init(&mut self, link: &LinkInfo) -> Result<LayerInit, LayerError> {
        self.link = link.name.clone();
        self.joined = true;
        debug!("{}: joining {} legacy room(s)", self.link, self.rooms.len());
        Ok(LayerInit {
            packets: self.room_packets(|room| LegacyClientPacket::Join { room }),
            ready: true,
        })
    }

    fn deinit(&mut self) -> Vec<String> {
        if !std::mem::replace(&mut self.joined, false) {
            return Vec::new();
        }
        self.room_packets(|room| LegacyClientPacket::Leave { room })
    }

    fn encode(&mut self, packets: Vec<String>) -> Vec<String> {
        let mut out = Vec::new();
        for body in packets {
            for room in &self.rooms {
                let packet = LegacyClientPacket::Message {
                    room: room.clone(),
                    body: body.clone(),
                };
                match packet.encode() {
                    Ok(encoded) => out.push(encoded),
                    Err(e) => warn!("{}: cannot encode message: {}", self.link, e),
                }
            }
        }
        out
    }

    fn decode(&mut self, packet: String) -> Decoded {
        match LegacyServerPacket::decode(&packet) {
            Ok(LegacyServerPacket::Message { room, body, .. }) if self.rooms.contains(&room) => {
                Decoded::up(body_to_text(body))
            }
            Ok(LegacyServerPacket::Error { message }) => {
                warn!("{}: legacy highway error: {}", self.link, message);
                Decoded::nothing()
            }
            Ok(_) => Decoded::nothing(),
            Err(e) => {
                warn!("{}: dropping malformed legacy packet: {}", self.link, e);
                Decoded::nothing()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_flow() {
        let mut layer = LegacyHighwayLayer::new(vec!["a".to_string(), "b".to_string()]);
        let init = layer.init(&LinkInfo::new("old")).unwrap();
        assert!(init.ready);
        assert_eq!(
            init.packets,
            vec![
                r#"{"type":"join","room":"a"}"#.to_string(),
                r#"{"type":"join","room":"b"}"#.to_string(),
            ]
        );

        assert_eq!(layer.encode(vec!["hi".to_string()]).len(), 2);
        assert_eq!(
            layer.decode(r#"{"type":"message","room":"a","body":"hi"}"#.to_string()).up,
            vec!["hi".to_string()]
        );
        assert!(layer.decode(r#"{"type":"message","room":"z","body":"hi"}"#.to_string()).up.is_empty());
        assert!(layer.decode(r#"{"type":"hello"}"#.to_string()).up.is_empty());
        assert!(layer.decode("garbage".to_string()).up.is_empty());

        assert_eq!(layer.deinit()[0], r#"{"type":"leave","room":"a"}"#);
        assert!(layer.deinit().is_empty());
    }
}
