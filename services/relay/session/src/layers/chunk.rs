//! Chunking layer

use crate::error::LayerError;
use crate::layer::{Decoded, RelayLayer};
use relay_wire::{ChunkConfig, Chunker};
use std::time::Instant;
use tracing::warn;

/// Splits oversized packets and reassembles fragments
#[derive(Debug)]
pub struct ChunkLayer {
    chunker: Chunker,
}

impl ChunkLayer {
    /// Create a new chunk layer
    pub fn new(config: ChunkConfig) -> Result<Self, LayerError> {
        Ok(Self {
            chunker: Chunker::new(config)?,
        })
    }
}

impl RelayLayer for ChunkLayer {
    fn name(&self) -> &'static str {
        "chunk"
    }

    fn encode(&mut self, packets: Vec<String>) -> Vec<String> {
        let mut out = Vec::with_capacity(packets.len());
        for packet in packets {
            match self.chunker.split(&packet) {
                Ok(fragments) => out.extend(fragments),
                Err(e) => warn!("Dropping packet that could not be chunked: {}", e),
            }
        }
        out
    }

    fn decode(&mut self, packet: String) -> Decoded {
        match self.chunker.receive(packet) {
            Some(payload) => Decoded::up(payload),
            None => Decoded::nothing(),
        }
    }

    fn sweep(&mut self, now: Instant) -> usize {
        self.chunker.sweep_at(now)
    }

    fn has_pending(&self) -> bool {
        self.chunker.has_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_chunk_layer_round_trip_reversed() {
        let mut layer = ChunkLayer::new(ChunkConfig {
            max_size: 8,
            timeout: Duration::from_secs(60),
        })
        .unwrap();

        let payload = "a payload well over eight bytes".to_string();
        let mut wire = layer.encode(vec![payload.clone(), "short".to_string()]);
        assert_eq!(wire.pop(), Some("short".to_string()));
        assert!(wire.len() > 1);

        let mut delivered = Vec::new();
        for fragment in wire.into_iter().rev() {
            delivered.extend(layer.decode(fragment).up);
        }
        assert_eq!(delivered, vec![payload]);
        assert!(!layer.has_pending());
    }

    #[test]
    fn test_chunk_layer_sweep() {
        let mut layer = ChunkLayer::new(ChunkConfig {
            max_size: 4,
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let wire = layer.encode(vec!["0123456789".to_string()]);
        assert!(layer.decode(wire[0].clone()).up.is_empty());
        assert!(layer.has_pending());
        assert_eq!(layer.sweep(Instant::now() + Duration::from_secs(5)), 1);
        assert!(!layer.has_pending());
    }
}
