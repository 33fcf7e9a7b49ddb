//! Relay links: one stack on one transport, wired into the hub.
//!
//! A link registers itself as receiver and emitter `relay(<name>)`, then
//! runs a single loop that multiplexes inbound packets, envelopes routed to
//! the relay, sweep ticks and shutdown. Any transport failure ends the loop
//! and is returned to the caller, which owns the reconnect policy.

use crate::codec::{decode_envelope, encode_envelope};
use crate::error::TransportError;
use crate::stack::RelayStack;
use crate::transport::RelayTransport;
use async_trait::async_trait;
use relay_routing::{
    ConfigError, DeliveryResult, Hop, HopType, MessageEmitter, MessageHub, MessageReceiver,
    RoutableEnvelope,
};
use std::sync::Arc;
use crate::sweeper::SweepTicks;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Relay link configuration
#[derive(Debug, Clone, Copy)]
pub struct RelayLinkConfig {
    /// Upper bound for a single transport write
    pub write_timeout: Duration,
    /// Envelopes buffered between the hub and the link loop
    pub outbound_capacity: usize,
}

impl Default for RelayLinkConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(10),
            outbound_capacity: 256,
        }
    }
}

/// Hub-facing end of a link; hands envelopes to the link loop
struct RelayReceiver {
    channel: String,
    tx: mpsc::Sender<RoutableEnvelope>,
}

#[async_trait]
impl MessageReceiver for RelayReceiver {
    async fn receive(&self, envelope: RoutableEnvelope, _destination: &str) -> bool {
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("{}: outbound queue full, dropping envelope", self.channel);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

struct RelayEmitter {
    description: String,
}

impl MessageEmitter for RelayEmitter {
    fn description(&self) -> String {
        self.description.clone()
    }
}

/// A named relay bound to a hub
pub struct RelayLink {
    hop: Hop,
    hub: Arc<MessageHub>,
    config: RelayLinkConfig,
}

impl RelayLink {
    /// Create a link named `name`
    pub fn new(name: &str, hub: Arc<MessageHub>, config: RelayLinkConfig) -> Result<Self, ConfigError> {
        let hop = Hop::parse(&format!("relay({})", name))?;
        if hop.hop_type != HopType::Relay {
            return Err(ConfigError::InvalidPattern(name.to_string()));
        }
        Ok(Self { hop, hub, config })
    }

    /// The hop this link prepends to inbound envelopes
    pub fn hop(&self) -> &Hop {
        &self.hop
    }

    /// Run the link until shutdown or a transport failure.
    ///
    /// The stack is started on the transport's link info; the hub
    /// registrations live exactly as long as this call.
    pub async fn run<T: RelayTransport>(
        &self,
        mut transport: T,
        mut stack: RelayStack,
        mut ticks: SweepTicks,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        let channel = self.hop.channel();
        let (tx, mut outbound) = mpsc::channel(self.config.outbound_capacity.max(1));

        self.hub.register_receiver(
            &channel,
            Arc::new(RelayReceiver {
                channel: channel.clone(),
                tx,
            }),
            true,
        )?;
        self.hub.register_emitter(
            &channel,
            Arc::new(RelayEmitter {
                description: format!("Relay via {}", stack.layer_names().join(" > ")),
            }),
            true,
        )?;
        info!("{}: link up", channel);

        let result = self
            .drive(&mut transport, &mut stack, &mut outbound, &mut ticks, &mut shutdown)
            .await;

        self.hub.unregister_receiver(&channel);
        self.hub.unregister_emitter(&channel);

        if result.is_ok() {
            for packet in stack.stop() {
                if let Err(e) = self.write(&mut transport, packet).await {
                    debug!("{}: farewell not sent: {}", channel, e);
                    break;
                }
            }
        }
        if let Err(e) = transport.close().await {
            debug!("{}: close failed: {}", channel, e);
        }

        match &result {
            Ok(()) => info!("{}: link stopped", channel),
            Err(e) => warn!("{}: link down: {}", channel, e),
        }
        result
    }

    async fn drive<T: RelayTransport>(
        &self,
        transport: &mut T,
        stack: &mut RelayStack,
        outbound: &mut mpsc::Receiver<RoutableEnvelope>,
        ticks: &mut SweepTicks,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        if *shutdown.borrow() {
            return Ok(());
        }

        let link = transport.link_info();
        for packet in stack.start(&link)? {
            self.write(transport, packet).await?;
        }

        let mut ticking = true;
        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    return Ok(());
                }

                inbound = transport.recv_text() => {
                    match inbound? {
                        Some(raw) => self.on_inbound(transport, stack, raw).await?,
                        None => return Err(TransportError::Closed),
                    }
                }

                Some(envelope) = outbound.recv() => {
                    self.on_outbound(transport, stack, envelope).await?;
                }

                alive = ticks.tick(), if ticking && stack.has_pending() => {
                    if alive {
                        let evicted = stack.sweep(Instant::now());
                        if evicted > 0 {
                            debug!("{}: evicted {} stale fragment set(s)", self.hop, evicted);
                        }
                    } else {
                        ticking = false;
                    }
                }
            }
            ticks.set_pending(stack.has_pending());
        }
    }

    async fn on_inbound<T: RelayTransport>(
        &self,
        transport: &mut T,
        stack: &mut RelayStack,
        raw: String,
    ) -> Result<(), TransportError> {
        let output = stack.receive(raw)?;
        for packet in output.reply {
            self.write(transport, packet).await?;
        }

        for payload in output.up {
            let Some(mut envelope) = decode_envelope(&payload) else {
                continue;
            };
            envelope.prepend_hop(self.hop.clone());
            match self.hub.handle(envelope).await {
                DeliveryResult::Delivered(n) => debug!("{}: delivered to {} receiver(s)", self.hop, n),
                other => debug!("{}: inbound envelope {:?}", self.hop, other),
            }
        }
        Ok(())
    }

    async fn on_outbound<T: RelayTransport>(
        &self,
        transport: &mut T,
        stack: &mut RelayStack,
        mut envelope: RoutableEnvelope,
    ) -> Result<(), TransportError> {
        // the hub appended our own hop on delivery
        if envelope.path.last().is_some_and(|hop| hop.same_channel(&self.hop)) {
            envelope.path.pop();
        }

        let payload = match encode_envelope(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("{}: cannot encode envelope: {}", self.hop, e);
                return Ok(());
            }
        };
        for packet in stack.send(vec![payload]) {
            self.write(transport, packet).await?;
        }
        Ok(())
    }

    async fn write<T: RelayTransport>(&self, transport: &mut T, packet: String) -> Result<(), TransportError> {
        let limit = self.config.write_timeout;
        tokio::time::timeout(limit, transport.send_text(packet))
            .await
            .map_err(|_| TransportError::WriteTimeout(limit))?
    }
}
