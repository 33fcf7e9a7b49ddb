//! The relay layer contract

use crate::error::LayerError;
use std::time::Instant;

/// Facts about the connection a stack is bound to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkInfo {
    /// Link name, also the relay hop qualifier
    pub name: String,
    /// Protocol version reported by the server during the handshake
    pub protocol_version: Option<String>,
}

impl LinkInfo {
    /// Create link info without a negotiated version
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            protocol_version: None,
        }
    }

    /// Attach a negotiated protocol version
    pub fn with_version(mut self, version: &str) -> Self {
        self.protocol_version = Some(version.to_string());
        self
    }
}

/// Result of a layer's initialization step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerInit {
    /// Handshake packets to send through the layers below
    pub packets: Vec<String>,
    /// Whether the layer is usable right away
    pub ready: bool,
}

impl LayerInit {
    /// Ready without a handshake
    pub fn ready() -> Self {
        Self {
            packets: Vec::new(),
            ready: true,
        }
    }
}

/// Result of decoding one inbound packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Packets for the layer above; empty when nothing is deliverable yet
    pub up: Vec<String>,
    /// Packets this layer wants sent back down
    pub reply: Vec<String>,
}

impl Decoded {
    /// Nothing to deliver
    pub fn nothing() -> Self {
        Self::default()
    }

    /// One packet for the layer above
    pub fn up(packet: String) -> Self {
        Self {
            up: vec![packet],
            reply: Vec::new(),
        }
    }
}

/// One transform in a relay stack.
///
/// Layers are per-connection state machines: `encode` runs on the way
/// down, `decode` on the way up, and either may expand or swallow packets.
pub trait RelayLayer: Send {
    /// Layer name for logs
    fn name(&self) -> &'static str;

    /// Start the layer on a fresh connection
    fn init(&mut self, link: &LinkInfo) -> Result<LayerInit, LayerError> {
        let _ = link;
        Ok(LayerInit::ready())
    }

    /// Whether a pending handshake has completed
    fn is_ready(&self) -> bool {
        true
    }

    /// Packets to send before the connection is closed
    fn deinit(&mut self) -> Vec<String> {
        Vec::new()
    }

    /// Transform outbound packets
    fn encode(&mut self, packets: Vec<String>) -> Vec<String>;

    /// Transform one inbound packet
    fn decode(&mut self, packet: String) -> Decoded;

    /// Drop stale partial state, returning how many entries were evicted
    fn sweep(&mut self, now: Instant) -> usize {
        let _ = now;
        0
    }

    /// Whether the layer holds partial state a sweep could evict
    fn has_pending(&self) -> bool {
        false
    }
}
