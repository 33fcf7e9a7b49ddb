//! Encryption layer

use crate::error::LayerError;
use crate::layer::{Decoded, RelayLayer};
use relay_wire::PacketCipher;
use tracing::warn;

/// Encrypts every packet with AES-256-GCM under a shared password
#[derive(Debug)]
pub struct EncryptionLayer {
    cipher: PacketCipher,
}

impl EncryptionLayer {
    /// Create a new encryption layer
    pub fn new(password: &str) -> Result<Self, LayerError> {
        Ok(Self {
            cipher: PacketCipher::new(password)?,
        })
    }
}

impl RelayLayer for EncryptionLayer {
    fn name(&self) -> &'static str {
        "encryption"
    }

    fn encode(&mut self, packets: Vec<String>) -> Vec<String> {
        packets
            .into_iter()
            .filter_map(|packet| match self.cipher.encrypt(&packet) {
                Ok(sealed) => Some(sealed),
                Err(e) => {
                    warn!("Dropping packet that could not be encrypted: {}", e);
                    None
                }
            })
            .collect()
    }

    fn decode(&mut self, packet: String) -> Decoded {
        match self.cipher.decrypt(&packet) {
            Some(plain) => Decoded::up(plain),
            None => Decoded::nothing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_password_round_trip() {
        let mut a = EncryptionLayer::new("hunter2").unwrap();
        let mut b = EncryptionLayer::new("hunter2").unwrap();
        let wire = a.encode(vec!["{\"type\":\"message\"}".to_string()]);
        assert_eq!(wire.len(), 1);
        assert_eq!(b.decode(wire[0].clone()).up, vec!["{\"type\":\"message\"}".to_string()]);
    }

    #[test]
    fn test_wrong_password_yields_nothing() {
        let mut a = EncryptionLayer::new("one").unwrap();
        let mut b = EncryptionLayer::new("two").unwrap();
        let wire = a.encode(vec!["secret".to_string()]);
        assert_eq!(b.decode(wire[0].clone()), Decoded::nothing());
        assert_eq!(b.decode("plain text".to_string()), Decoded::nothing());
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(EncryptionLayer::new(""), Err(LayerError::Wire(_))));
    }
}
