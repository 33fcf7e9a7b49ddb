//! Relay stacks, layer adapters, transports and link loops for the relay hub.
//!
//! This crate turns the string codecs of `relay-wire` into per-connection
//! state machines and connects them to the message hub.
//!
//! ## Features
//!
//! - **Relay Stack**: Ordered layers with bottom-up initialization and
//!   queued sends until every handshake has completed
//! - **Layers**: Encryption, chunking, Highway and legacy Highway adapters
//! - **Native Codec**: JSON envelope encoding spoken at the top of a stack
//! - **Transports**: Websocket client and in-process channel transports
//! - **Relay Link**: Single read loop per connection, registered with the
//!   hub as `relay(<name>)`
//! - **Chunk Sweeper**: Shared tick source evicting stale fragments
//!
//! ## Example
//!
//! ```rust,no_run
//! use relay_routing::MessageHub;
//! use relay_session::{ChunkSweeper, ProtocolConfig, RelayLink, RelayLinkConfig, StackConfig, WebsocketTransport};
//! use relay_storage::MemoryRouteStore;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = Arc::new(MessageHub::new(Arc::new(MemoryRouteStore::new())));
//! let sweeper = ChunkSweeper::default();
//! let (_stop, shutdown) = watch::channel(false);
//!
//! let stack = StackConfig {
//!     password: Some("shared secret".to_string()),
//!     chunk: None,
//!     protocol: ProtocolConfig::Highway { rooms: vec!["alliance".to_string()] },
//! }
//! .build()?;
//! let transport = WebsocketTransport::connect("alliance", "ws://127.0.0.1:2501").await?;
//! let link = RelayLink::new("alliance", hub.clone(), RelayLinkConfig::default())?;
//! link.run(transport, stack, sweeper.subscribe(), shutdown).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod layer;
pub mod layers;
pub mod link;
pub mod stack;
pub mod sweeper;
pub mod transport;

// Re-export main types
pub use codec::{decode_envelope, encode_envelope};
pub use error::{LayerError, TransportError};
pub use layer::{Decoded, LayerInit, LinkInfo, RelayLayer};
pub use layers::{
    ChunkLayer, EncryptionLayer, HighwayLayer, LegacyHighwayLayer, ProtocolConfig, RoomInfo,
    StackConfig,
};
pub use link::{RelayLink, RelayLinkConfig};
pub use stack::{RelayStack, StackOutput};
pub use sweeper::{ChunkSweeper, SweepTicks, DEFAULT_SWEEP_INTERVAL};
pub use transport::{ChannelTransport, RelayTransport, WebsocketTransport};
