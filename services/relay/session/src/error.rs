//! Relay link error types.

use relay_routing::ConfigError;
use relay_wire::WireError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building or initializing a relay stack
#[derive(Error, Debug)]
pub enum LayerError {
    /// Layer configuration is invalid
    #[error("invalid layer configuration: {0}")]
    Config(String),

    /// The transport did not report a protocol version
    #[error("{layer}: no protocol version negotiated")]
    MissingVersion {
        /// Layer name
        layer: &'static str,
    },

    /// Codec level failure
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Errors that end a relay link
#[derive(Error, Debug)]
pub enum TransportError {
    /// The far end closed the connection
    #[error("connection closed by peer")]
    Closed,

    /// A write did not complete in time
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// Websocket failure
    #[error("websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The stack refused to start on this connection
    #[error("stack initialization failed: {0}")]
    Layer(#[from] LayerError),

    /// The hub refused the link's receiver or emitter
    #[error("hub registration failed: {0}")]
    Registration(#[from] ConfigError),
}
