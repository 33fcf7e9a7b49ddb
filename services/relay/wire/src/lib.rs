//! Relay packet codecs: chunking, AES-256-GCM packet encryption and Highway framing.
//!
//! This crate provides the low-level, transport-independent codecs used by
//! relay stacks. Every codec works on plain strings so it can sit on top of
//! any text transport (tells, a private channel, a websocket).
//!
//! ## Features
//!
//! - **Chunking**: Split oversized packets into correlated fragments and
//!   reassemble them in any arrival order, evicting stale partial sets
//! - **Packet Encryption**: AES-256-GCM with a password-derived key and a
//!   fresh nonce per packet
//! - **Highway**: Versioned JSON room protocol (subscribe/unsubscribe/message)
//! - **Legacy Highway**: The older join/leave dialect of the same protocol
//!
//! ## Encrypted Packet Format
//!
//! ```text
//! base64(
//! +----------------------+----------------------------+
//! | iv (12B)             | per-packet random nonce    |
//! +----------------------+----------------------------+
//! | tag (16B)            | GCM authentication tag     |
//! +----------------------+----------------------------+
//! | ciphertext           | variable (1..N)            |
//! +----------------------+----------------------------+
//! )
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod crypto;
pub mod error;
pub mod highway;
pub mod legacy;

// Re-export main types
pub use chunk::{Chunk, ChunkConfig, Chunker, DEFAULT_CHUNK_TIMEOUT, DEFAULT_MAX_CHUNK_SIZE};
pub use crypto::{PacketCipher, NONCE_LEN, TAG_LEN};
pub use error::WireError;
pub use highway::{
    body_to_text, check_version, ClientPacket, HighwayCommand, ServerPacket,
    SUPPORTED_VERSIONS, VERSION_HEADER,
};
pub use legacy::{LegacyClientPacket, LegacyServerPacket};
