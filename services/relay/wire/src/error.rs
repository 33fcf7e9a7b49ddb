//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Packet is not valid JSON for the expected shape
    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Protocol version missing or outside the accepted ranges
    #[error("version unsupported: {0}")]
    Version(String),

    /// Cipher could not be constructed or a packet could not be sealed
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Invalid chunking configuration
    #[error("invalid chunk config: {0}")]
    ChunkConfig(String),
}
