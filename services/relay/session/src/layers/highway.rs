//! Highway protocol layer.
//!
//! The bottom layer of a websocket relay. Rooms are subscribed one at a
//! time; each `subscribe` is answered by a `success` or `error` before the
//! next one goes out, and the layer is ready once the list is exhausted.

use crate::error::LayerError;
use crate::layer::{Decoded, LayerInit, LinkInfo, RelayLayer};
use relay_wire::{body_to_text, check_version, ClientPacket, ServerPacket};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

/// What the server told us about a room
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomInfo {
    /// Whether publishing is refused
    pub read_only: bool,
    /// Current subscribers
    pub users: Vec<serde_json::Value>,
    /// Server-side rate limits, recorded but not enforced
    pub rate_limits: Option<serde_json::Value>,
}

/// Highway room protocol adapter
#[derive(Debug)]
pub struct HighwayLayer {
    rooms: Vec<String>,
    link: String,
    version: Option<semver::Version>,
    to_subscribe: VecDeque<String>,
    in_flight: Option<String>,
    subscribed: Vec<String>,
    room_info: HashMap<String, RoomInfo>,
    ready: bool,
}

impl HighwayLayer {
    /// Create a layer that will subscribe to `rooms`
    pub fn new(rooms: Vec<String>) -> Self {
        Self {
            rooms,
            link: String::new(),
            version: None,
            to_subscribe: VecDeque::new(),
            in_flight: None,
            subscribed: Vec::new(),
            room_info: HashMap::new(),
            ready: false,
        }
    }

    /// Negotiated protocol version
    pub fn version(&self) -> Option<&semver::Version> {
        self.version.as_ref()
    }

    /// Rooms the server confirmed
    pub fn subscribed(&self) -> &[String] {
        &self.subscribed
    }

    /// Latest room information, if the server sent any
    pub fn room_info(&self, room: &str) -> Option<&RoomInfo> {
        self.room_info.get(room)
    }

    /// Send the next queued subscribe, or become ready
    fn next_subscribe(&mut self) -> Vec<String> {
        while let Some(room) = self.to_subscribe.pop_front() {
            match ClientPacket::subscribe(room.as_str()).encode() {
                Ok(packet) => {
                    debug!("{}: subscribing to {}", self.link, room);
                    self.in_flight = Some(room);
                    return vec![packet];
                }
                Err(e) => warn!("{}: cannot encode subscribe for {}: {}", self.link, room, e),
            }
        }
        if !self.ready {
            info!(
                "{}: highway ready, subscribed to {} room(s)",
                self.link,
                self.subscribed.len()
            );
        }
        self.ready = true;
        Vec::new()
    }

    fn is_read_only(&self, room: &str) -> bool {
        self.room_info.get(room).map(|i| i.read_only).unwrap_or(false)
    }
}

impl RelayLayer for HighwayLayer {
    fn name(&self) -> &'static str {
        "highway"
    }

    fn init(&mut self, link: &LinkInfo) -> Result<LayerInit, LayerError> {
        self.link = link.name.clone();
        let raw = link
            .protocol_version
            .as_deref()
            .ok_or(LayerError::MissingVersion { layer: "highway" })?;
        let version = check_version(raw)?;
        info!("{}: highway protocol version {}", self.link, version);

        self.version = Some(version);
        self.ready = false;
        self.in_flight = None;
        self.subscribed.clear();
        self.room_info.clear();
        self.to_subscribe = self.rooms.iter().cloned().collect();

        let packets = self.next_subscribe();
        Ok(LayerInit {
            packets,
            ready: self.ready,
        })
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn deinit(&mut self) -> Vec<String> {
        self.ready = false;
        self.in_flight = None;
        self.to_subscribe.clear();
        std::mem::take(&mut self.subscribed)
            .into_iter()
            .filter_map(|room| ClientPacket::unsubscribe(room).encode().ok())
            .collect()
    }

    fn encode(&mut self, packets: Vec<String>) -> Vec<String> {
        let mut out = Vec::new();
        for body in packets {
            for room in &self.subscribed {
                if self.is_read_only(room) {
                    warn!("{}: room {} is read-only, dropping message", self.link, room);
                    continue;
                }
                let packet = ClientPacket::Message {
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
        let parsed = match ServerPacket::decode(&packet) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("{}: dropping malformed highway packet: {}", self.link, e);
                return Decoded::nothing();
            }
        };

        match parsed {
            ServerPacket::Hello { public_rooms, .. } => {
                debug!("{}: hello, public rooms {:?}", self.link, public_rooms);
                Decoded::nothing()
            }
            ServerPacket::RoomInfo {
                room,
                read_only,
                users,
                rate_limits,
            } => {
                if let Some(limits) = &rate_limits {
                    debug!("{}: room {} rate limits {}", self.link, room, limits);
                }
                self.room_info.insert(
                    room,
                    RoomInfo {
                        read_only,
                        users,
                        rate_limits,
                    },
                );
                Decoded::nothing()
            }
            ServerPacket::Success { .. } => match self.in_flight.take() {
                Some(room) => {
                    debug!("{}: subscribed to {}", self.link, room);
                    self.subscribed.push(room);
                    Decoded {
                        up: Vec::new(),
                        reply: self.next_subscribe(),
                    }
                }
                None => Decoded::nothing(),
            },
            ServerPacket::Error { message } => match self.in_flight.take() {
                Some(room) => {
                    warn!("{}: subscribe to {} refused: {}", self.link, room, message);
                    Decoded {
                        up: Vec::new(),
                        reply: self.next_subscribe(),
                    }
                }
                None => {
                    warn!("{}: highway error: {}", self.link, message);
                    Decoded::nothing()
                }
            },
            ServerPacket::Message { room, body, .. } => {
                if self.subscribed.contains(&room) {
                    Decoded::up(body_to_text(body))
                } else {
                    debug!("{}: ignoring message for unsubscribed room {}", self.link, room);
                    Decoded::nothing()
                }
            }
            ServerPacket::Unknown => Decoded::nothing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::RelayStack;

    fn link() -> LinkInfo {
        LinkInfo::new("hw").with_version("0.3.1")
    }

    fn rooms() -> Vec<String> {
        vec!["alpha".to_string(), "beta".to_string()]
    }

    fn room_of(packet: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(packet).unwrap();
        value["room"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_subscribes_are_correlated_one_at_a_time() {
        let mut layer = HighwayLayer::new(rooms());
        let init = layer.init(&link()).unwrap();
        assert!(!init.ready);
        assert_eq!(init.packets.len(), 1);
        assert_eq!(room_of(&init.packets[0]), "alpha");

        let first = layer.decode(r#"{"type":"success","message":"ok"}"#.to_string());
        assert!(first.up.is_empty());
        assert_eq!(first.reply.len(), 1);
        assert_eq!(room_of(&first.reply[0]), "beta");
        assert!(!layer.is_ready());

        let second = layer.decode(r#"{"type":"success"}"#.to_string());
        assert!(second.reply.is_empty());
        assert!(layer.is_ready());
        assert_eq!(layer.subscribed(), &["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_refused_subscribe_moves_on() {
        let mut layer = HighwayLayer::new(rooms());
        layer.init(&link()).unwrap();
        let out = layer.decode(r#"{"type":"error","message":"no such room"}"#.to_string());
        assert_eq!(room_of(&out.reply[0]), "beta");
        layer.decode(r#"{"type":"success"}"#.to_string());
        assert!(layer.is_ready());
        assert_eq!(layer.subscribed(), &["beta".to_string()]);
    }

    #[test]
    fn test_version_refusal() {
        let mut layer = HighwayLayer::new(rooms());
        assert!(matches!(
            layer.init(&LinkInfo::new("hw")),
            Err(LayerError::MissingVersion { layer: "highway" })
        ));
        assert!(matches!(
            layer.init(&LinkInfo::new("hw").with_version("0.1.0")),
            Err(LayerError::Wire(_))
        ));
        assert!(layer.init(&LinkInfo::new("hw").with_version("0.2.0")).is_ok());
    }

    #[test]
    fn test_no_rooms_is_ready_immediately() {
        let mut layer = HighwayLayer::new(Vec::new());
        let init = layer.init(&link()).unwrap();
        assert!(init.ready);
        assert!(init.packets.is_empty());
    }

    #[test]
    fn test_messages_and_noise() {
        let mut layer = HighwayLayer::new(vec!["alpha".to_string()]);
        layer.init(&link()).unwrap();
        layer.decode(r#"{"type":"success"}"#.to_string());

        let msg = layer.decode(r#"{"type":"message","room":"alpha","body":"payload","user":"u1"}"#.to_string());
        assert_eq!(msg.up, vec!["payload".to_string()]);

        let structured = layer.decode(r#"{"type":"message","room":"alpha","body":{"k":1}}"#.to_string());
        assert_eq!(structured.up, vec![r#"{"k":1}"#.to_string()]);

        assert!(layer.decode(r#"{"type":"message","room":"other","body":"x"}"#.to_string()).up.is_empty());
        assert!(layer.decode("not json".to_string()).up.is_empty());
        assert!(layer.decode(r#"{"type":"shiny_new_thing"}"#.to_string()).up.is_empty());
    }

    #[test]
    fn test_read_only_rooms_are_skipped() {
        let mut layer = HighwayLayer::new(rooms());
        layer.init(&link()).unwrap();
        layer.decode(r#"{"type":"success"}"#.to_string());
        layer.decode(r#"{"type":"success"}"#.to_string());
        layer.decode(
            r#"{"type":"room_info","room":"beta","readOnly":true,"users":[],"rateLimits":{"messages":5}}"#
                .to_string(),
        );
        assert!(layer.room_info("beta").unwrap().rate_limits.is_some());

        let out = layer.encode(vec!["hi".to_string()]);
        assert_eq!(out.len(), 1);
        assert_eq!(room_of(&out[0]), "alpha");
    }

    #[test]
    fn test_stack_flushes_after_subscriptions() {
        let mut stack = RelayStack::new(vec![Box::new(HighwayLayer::new(vec!["alpha".to_string()]))]);
        let first = stack.start(&link()).unwrap();
        assert_eq!(first.len(), 1);
        assert!(stack.send(vec!["queued".to_string()]).is_empty());

        let out = stack.receive(r#"{"type":"success"}"#.to_string()).unwrap();
        assert!(stack.is_ready());
        assert_eq!(out.reply.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&out.reply[0]).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["body"], "queued");

        let bye = stack.stop();
        let value: serde_json::Value = serde_json::from_str(&bye[0]).unwrap();
        assert_eq!(value["cmd"], "unsubscribe");
    }
}
