//! Relay stacks: ordered layers bound to one connection.
//!
//! Index 0 is the topmost layer. Outbound packets run top to bottom,
//! inbound packets bottom to top. Initialization runs bottom-up: a layer
//! whose handshake is still pending holds the cursor until a decoded reply
//! makes it ready, and only then are the layers above it started.

use crate::error::LayerError;
use crate::layer::{LinkInfo, RelayLayer};
use std::time::Instant;
use tracing::{debug, info};

/// Packets produced by feeding one raw packet into the stack
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StackOutput {
    /// Payloads that made it through the top layer
    pub up: Vec<String>,
    /// Wire packets to send back (handshake steps, acknowledgements, queued sends)
    pub reply: Vec<String>,
}

/// Ordered chain of layers for one connection
pub struct RelayStack {
    layers: Vec<Box<dyn RelayLayer>>,
    link: Option<LinkInfo>,
    /// Index of the layer whose handshake is pending
    waiting_on: Option<usize>,
    /// Number of bottom layers not yet started
    unstarted: usize,
    /// Outbound packets held back until the stack is ready
    queued: Vec<String>,
}

impl std::fmt::Debug for RelayStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayStack")
            .field("layers", &self.layer_names())
            .field("waiting_on", &self.waiting_on)
            .field("unstarted", &self.unstarted)
            .finish()
    }
}

impl RelayStack {
    /// Create a stack from layers ordered top to bottom
    pub fn new(layers: Vec<Box<dyn RelayLayer>>) -> Self {
        let unstarted = layers.len();
        Self {
            layers,
            link: None,
            waiting_on: None,
            unstarted,
            queued: Vec::new(),
        }
    }

    /// Layer names, top to bottom
    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    /// Whether every layer has finished initializing
    pub fn is_ready(&self) -> bool {
        self.link.is_some() && self.unstarted == 0 && self.waiting_on.is_none()
    }

    /// Start all layers, returning the wire packets to send
    pub fn start(&mut self, link: &LinkInfo) -> Result<Vec<String>, LayerError> {
        self.link = Some(link.clone());
        self.waiting_on = None;
        self.unstarted = self.layers.len();
        self.advance()
    }

    /// Start layers bottom-up until one is pending or all are ready
    fn advance(&mut self) -> Result<Vec<String>, LayerError> {
        let Some(link) = self.link.clone() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        while self.waiting_on.is_none() && self.unstarted > 0 {
            let index = self.unstarted - 1;
            let init = self.layers[index].init(&link)?;
            self.unstarted -= 1;
            out.extend(self.encode_below(index, init.packets));
            if init.ready {
                debug!("{}: layer {} ready", link.name, self.layers[index].name());
            } else {
                debug!("{}: layer {} waiting for handshake", link.name, self.layers[index].name());
                self.waiting_on = Some(index);
            }
        }
        if self.is_ready() {
            info!("{}: relay stack ready ({})", link.name, self.layer_names().join(" > "));
            if !self.queued.is_empty() {
                let queued = std::mem::take(&mut self.queued);
                out.extend(self.encode_from(0, queued));
            }
        }
        Ok(out)
    }

    fn encode_from(&mut self, start: usize, mut packets: Vec<String>) -> Vec<String> {
        for layer in self.layers.iter_mut().skip(start) {
            if packets.is_empty() {
                break;
            }
            packets = layer.encode(packets);
        }
        packets
    }

    fn encode_below(&mut self, index: usize, packets: Vec<String>) -> Vec<String> {
        self.encode_from(index + 1, packets)
    }

    /// Encode outbound payloads down the stack.
    ///
    /// Payloads sent before the stack is ready are held and flushed once it is.
    pub fn send(&mut self, packets: Vec<String>) -> Vec<String> {
        if !self.is_ready() {
            debug!("Relay stack not ready, queueing {} packets", packets.len());
            self.queued.extend(packets);
            return Vec::new();
        }
        self.encode_from(0, packets)
    }

    /// Decode one raw packet up the stack
    pub fn receive(&mut self, raw: String) -> Result<StackOutput, LayerError> {
        let mut output = StackOutput::default();
        let mut current = vec![raw];
        for index in (0..self.layers.len()).rev() {
            let mut next = Vec::new();
            for packet in current {
                let decoded = self.layers[index].decode(packet);
                let reply = self.encode_below(index, decoded.reply);
                output.reply.extend(reply);
                next.extend(decoded.up);
            }
            current = next;

            if self.waiting_on == Some(index) && self.layers[index].is_ready() {
                self.waiting_on = None;
                output.reply.extend(self.advance()?);
            }
            if current.is_empty() {
                return Ok(output);
            }
        }
        output.up = current;
        Ok(output)
    }

    /// Shut down all layers top-down, returning farewell packets
    pub fn stop(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        for index in 0..self.layers.len() {
            let packets = self.layers[index].deinit();
            out.extend(self.encode_below(index, packets));
        }
        self.link = None;
        self.waiting_on = None;
        self.unstarted = self.layers.len();
        self.queued.clear();
        out
    }

    /// Evict stale partial state in every layer
    pub fn sweep(&mut self, now: Instant) -> usize {
        self.layers.iter_mut().map(|l| l.sweep(now)).sum()
    }

    /// Whether any layer holds partial state
    pub fn has_pending(&self) -> bool {
        self.layers.iter().any(|l| l.has_pending())
    }
}
