//! Concrete relay layers and stack assembly.

pub mod chunk;
pub mod encryption;
pub mod highway;
pub mod legacy;

pub use chunk::ChunkLayer;
pub use encryption::EncryptionLayer;
pub use highway::{HighwayLayer, RoomInfo};
pub use legacy::LegacyHighwayLayer;

use crate::error::LayerError;
use crate::layer::RelayLayer;
use crate::stack::RelayStack;
use relay_wire::ChunkConfig;

/// Room protocol spoken at the bottom of a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolConfig {
    /// Versioned Highway with acknowledged subscribes
    Highway {
        /// Rooms to subscribe to
        rooms: Vec<String>,
    },
    /// Pre-0.2 Highway with fire and forget joins
    LegacyHighway {
        /// Rooms to join
        rooms: Vec<String>,
    },
    /// Raw transport, no room protocol
    None,
}

/// Which layers a link runs, and how they are configured
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Shared password; enables the encryption layer
    pub password: Option<String>,
    /// Chunking parameters; enables the chunk layer
    pub chunk: Option<ChunkConfig>,
    /// Bottom protocol layer
    pub protocol: ProtocolConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            password: None,
            chunk: None,
            protocol: ProtocolConfig::None,
        }
    }
}

impl StackConfig {
    /// Build the stack: encryption on top, then chunking, then the protocol
    pub fn build(&self) -> Result<RelayStack, LayerError> {
        let mut layers: Vec<Box<dyn RelayLayer>> = Vec::new();

        if let Some(password) = &self.password {
            layers.push(Box::new(EncryptionLayer::new(password)?));
        }
        if let Some(chunk) = self.chunk {
            layers.push(Box::new(ChunkLayer::new(chunk)?));
        }
        match &self.protocol {
            ProtocolConfig::Highway { rooms } => {
                if rooms.iter().any(|r| r.trim().is_empty()) {
                    return Err(LayerError::Config("empty highway room name".to_string()));
                }
                layers.push(Box::new(HighwayLayer::new(rooms.clone())));
            }
            ProtocolConfig::LegacyHighway { rooms } => {
                layers.push(Box::new(LegacyHighwayLayer::new(rooms.clone())));
            }
            ProtocolConfig::None => {}
        }

        Ok(RelayStack::new(layers))
    }
}
