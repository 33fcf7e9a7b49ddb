//! Message routing for the relay hub.
//!
//! Every chat message or event produced anywhere in the bot is wrapped in a
//! [`RoutableEnvelope`] carrying the path of hops it has traversed. The
//! [`MessageHub`] matches the envelope's entry hop against its rule table,
//! runs each matching route's modifier chain and delivers the result to
//! every receiver the route's destination resolves to.
//!
//! Routes are written in a small definition language:
//!
//! ```text
//! route add relay(*) <-> org if-has-prefix(prefix="!") remove-popups
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dsl;
pub mod envelope;
pub mod error;
pub mod hub;
pub mod modifier;
pub mod pattern;
pub mod render;
pub mod route;

pub use envelope::{Character, EnvelopeKind, EventPayload, Hop, HopType, RoutableEnvelope};
pub use error::{ConfigError, DslError, ModifierError};
pub use hub::{DeliveryResult, HubStats, MessageEmitter, MessageHub, MessageReceiver};
pub use modifier::{ArgValue, EventModifier, ModifierRegistry, RouteModifier};
pub use pattern::ChannelPattern;
pub use render::{HopColor, HopFormat, RenderConfig};
pub use route::Route;
