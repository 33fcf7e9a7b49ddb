//! AES-256-GCM packet encryption with a shared password.
//!
//! All relay participants derive the same key from the configured password;
//! there is no key exchange. Decryption never returns an error to the
//! caller: anything that does not authenticate is logged and dropped.

use crate::error::WireError;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Packet cipher keyed from a shared password
pub struct PacketCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for PacketCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketCipher").finish_non_exhaustive()
    }
}

impl PacketCipher {
    /// Derive the key from a password
    pub fn new(password: &str) -> Result<Self, WireError> {
        if password.is_empty() {
            return Err(WireError::Crypto("password must not be empty".to_string()));
        }
        let key = Sha256::digest(password.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| WireError::Crypto(format!("invalid key: {}", e)))?;
        Ok(Self { cipher })
    }

    /// Encrypt a packet into `base64(iv || tag || ciphertext)`.
    ///
    /// Empty packets are refused: the receiving side treats a packet without
    /// ciphertext as malformed.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, WireError> {
        if plaintext.is_empty() {
            return Err(WireError::Crypto("refusing to seal an empty packet".to_string()));
        }
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(&nonce, b"", &mut buffer)
            .map_err(|_| WireError::Crypto("encryption failed".to_string()))?;

        let mut raw = Vec::with_capacity(NONCE_LEN + TAG_LEN + buffer.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&tag);
        raw.extend_from_slice(&buffer);
        Ok(STANDARD.encode(raw))
    }

    /// Decrypt a packet, returning `None` if it does not authenticate
    pub fn decrypt(&self, wire: &str) -> Option<String> {
        let raw = match STANDARD.decode(wire.trim()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Dropping packet that is not valid base64: {}", e);
                return None;
            }
        };

        if raw.len() <= NONCE_LEN + TAG_LEN {
            warn!("Dropping encrypted packet of {} bytes: no ciphertext", raw.len());
            return None;
        }

        let nonce = GenericArray::from_slice(&raw[..NONCE_LEN]);
        let tag = GenericArray::from_slice(&raw[NONCE_LEN..NONCE_LEN + TAG_LEN]);
        let mut buffer = raw[NONCE_LEN + TAG_LEN..].to_vec();

        if self
            .cipher
            .decrypt_in_place_detached(nonce, b"", &mut buffer, tag)
            .is_err()
        {
            warn!("Dropping encrypted packet: authentication failed (password mismatch?)");
            return None;
        }

        match String::from_utf8(buffer) {
            Ok(plaintext) => Some(plaintext),
            Err(_) => {
                debug!("Dropping decrypted packet that is not UTF-8");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let cipher = PacketCipher::new("secret").unwrap();
        for msg in ["x", "hello world", "{\"type\":\"message\"}", "ünïcödé ✓"] {
            let wire = cipher.encrypt(msg).unwrap();
            assert_eq!(cipher.decrypt(&wire).as_deref(), Some(msg));
        }
    }

    #[test]
    fn test_fresh_nonce_per_packet() {
        let cipher = PacketCipher::new("secret").unwrap();
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a, b);

        let raw_a = STANDARD.decode(&a).unwrap();
        let raw_b = STANDARD.decode(&b).unwrap();
        assert_ne!(raw_a[..NONCE_LEN], raw_b[..NONCE_LEN]);
    }

    #[test]
    fn test_tampering_detected() {
        let cipher = PacketCipher::new("secret").unwrap();
        let wire = cipher.encrypt("attack at dawn").unwrap();
        let raw = STANDARD.decode(&wire).unwrap();

        // Flip one byte in the tag and one in the ciphertext
        for idx in [NONCE_LEN + 3, raw.len() - 1] {
            let mut tampered = raw.clone();
            tampered[idx] ^= 0x01;
            assert_eq!(cipher.decrypt(&STANDARD.encode(&tampered)), None);
        }
    }

    #[test]
    fn test_wrong_password() {
        let alice = PacketCipher::new("alpha").unwrap();
        let bob = PacketCipher::new("bravo").unwrap();
        let wire = alice.encrypt("hi").unwrap();
        assert_eq!(bob.decrypt(&wire), None);
    }

    #[test]
    fn test_malformed_input() {
        let cipher = PacketCipher::new("secret").unwrap();
        assert_eq!(cipher.decrypt("not base64 !!!"), None);
        assert_eq!(cipher.decrypt(""), None);
        // iv + tag but no ciphertext
        assert_eq!(cipher.decrypt(&STANDARD.encode([0u8; NONCE_LEN + TAG_LEN])), None);
    }

    #[test]
    fn test_empty_packet_refused() {
        let cipher = PacketCipher::new("secret").unwrap();
        assert!(matches!(cipher.encrypt(""), Err(WireError::Crypto(_))));
        let single = cipher.encrypt(" ").unwrap();
        assert_eq!(cipher.decrypt(&single).as_deref(), Some(" "));
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(PacketCipher::new(""), Err(WireError::Crypto(_))));
    }
}
