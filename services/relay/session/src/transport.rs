//! Text transports a relay stack can run over.
//!
//! A transport moves whole text packets. Websockets carry Highway traffic;
//! channel transports bridge in-process sources such as tells or a private
//! channel, and back the tests.

use crate::error::TransportError;
use crate::layer::LinkInfo;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use relay_wire::VERSION_HEADER;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Bidirectional packet transport
#[async_trait]
pub trait RelayTransport: Send {
    /// Write one packet
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Read the next packet; `Ok(None)` means the peer closed cleanly
    async fn recv_text(&mut self) -> Result<Option<String>, TransportError>;

    /// Close the transport
    async fn close(&mut self) -> Result<(), TransportError>;

    /// What the stack needs to know about this connection
    fn link_info(&self) -> LinkInfo;
}

/// Client websocket transport
pub struct WebsocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    info: LinkInfo,
}

impl WebsocketTransport {
    /// Connect to `url`, recording the Highway version the server announces
    pub async fn connect(name: &str, url: &str) -> Result<Self, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(url).await?;
        let version = response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match &version {
            Some(v) => info!("{}: connected to {} (protocol {})", name, url, v),
            None => info!("{}: connected to {}", name, url),
        }

        Ok(Self {
            stream,
            info: LinkInfo {
                name: name.to_string(),
                protocol_version: version,
            },
        })
    }
}

#[async_trait]
impl RelayTransport for WebsocketTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Binary(data) => match String::from_utf8(data) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => warn!("{}: dropping non-UTF-8 binary frame", self.info.name),
                },
                Message::Close(frame) => {
                    debug!("{}: close frame {:?}", self.info.name, frame);
                    return Ok(None);
                }
                // ping replies are queued by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn link_info(&self) -> LinkInfo {
        self.info.clone()
    }
}

/// In-process transport backed by a pair of mpsc channels
pub struct ChannelTransport {
    tx: mpsc::Sender<String>,
    rx: mpsc::Receiver<String>,
    info: LinkInfo,
    closed: bool,
}

impl ChannelTransport {
    /// Wrap existing channel ends
    pub fn new(info: LinkInfo, tx: mpsc::Sender<String>, rx: mpsc::Receiver<String>) -> Self {
        Self {
            tx,
            rx,
            info,
            closed: false,
        }
    }

    /// Two connected transports; what one sends the other receives
    pub fn pair(left: LinkInfo, right: LinkInfo, capacity: usize) -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::channel(capacity);
        let (right_tx, left_rx) = mpsc::channel(capacity);
        (
            Self::new(left, left_tx, left_rx),
            Self::new(right, right_tx, right_rx),
        )
    }
}

#[async_trait]
impl RelayTransport for ChannelTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.tx.send(text).await.map_err(|_| TransportError::Closed)
    }

    async fn recv_text(&mut self) -> Result<Option<String>, TransportError> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rx.recv().await)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.rx.close();
        Ok(())
    }

    fn link_info(&self) -> LinkInfo {
        self.info.clone()
    }
}
