//! Routable envelopes and the hops they record

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of channel an envelope can pass through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HopType {
    /// Private message to or from a character
    Tell,
    /// The bot's private channel
    Priv,
    /// The org/guild channel
    Org,
    /// A Discord channel
    #[serde(alias = "discord")]
    DiscordPriv,
    /// Web chat
    Web,
    /// Systemic events
    System,
    /// Link to another bot instance
    Relay,
    /// Local console
    Console,
}

impl HopType {
    /// All hop types
    pub const ALL: [HopType; 8] = [
        HopType::Tell,
        HopType::Priv,
        HopType::Org,
        HopType::DiscordPriv,
        HopType::Web,
        HopType::System,
        HopType::Relay,
        HopType::Console,
    ];

    /// Canonical channel type name
    pub fn as_str(&self) -> &'static str {
        match self {
            HopType::Tell => "tell",
            HopType::Priv => "priv",
            HopType::Org => "org",
            HopType::DiscordPriv => "discord-priv",
            HopType::Web => "web",
            HopType::System => "system",
            HopType::Relay => "relay",
            HopType::Console => "console",
        }
    }

    /// Parse a channel type name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        if lower == "discord" {
            return Some(HopType::DiscordPriv);
        }
        HopType::ALL.into_iter().find(|t| t.as_str() == lower)
    }
}

impl fmt::Display for HopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One traversal point recorded in an envelope's path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    /// Channel type
    #[serde(rename = "type")]
    pub hop_type: HopType,
    /// Channel qualifier, e.g. the relay or Discord channel name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Display label, if it differs from the name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Hop {
    /// Create a hop
    pub fn new(hop_type: HopType, name: Option<&str>) -> Self {
        Self {
            hop_type,
            name: name.map(str::to_string),
            label: None,
        }
    }

    /// Create a named hop
    pub fn named(hop_type: HopType, name: &str) -> Self {
        Self::new(hop_type, Some(name))
    }

    /// Set the display label
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Parse a concrete channel name like `priv(Mybot)` or `org`
    pub fn parse(channel: &str) -> Result<Self, ConfigError> {
        let channel = channel.trim();
        let (type_name, name) = split_channel(channel)?;
        if name.as_deref() == Some("*") {
            return Err(ConfigError::InvalidPattern(channel.to_string()));
        }
        let hop_type = HopType::parse(type_name)
            .ok_or_else(|| ConfigError::UnknownHopType(channel.to_string()))?;
        Ok(Self {
            hop_type,
            name,
            label: None,
        })
    }

    /// Channel string, `type(name)` or `type`
    pub fn channel(&self) -> String {
        match &self.name {
            Some(name) => format!("{}({})", self.hop_type, name),
            None => self.hop_type.to_string(),
        }
    }

    /// Display label: label, else name, else the type
    pub fn display_label(&self) -> &str {
        self.label
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_else(|| self.hop_type.as_str())
    }

    /// Compare channels case-insensitively, ignoring labels
    pub fn same_channel(&self, other: &Hop) -> bool {
        self.hop_type == other.hop_type
            && match (&self.name, &other.name) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.channel())
    }
}

/// Split `type(qualifier)` into its parts
pub(crate) fn split_channel(channel: &str) -> Result<(&str, Option<String>), ConfigError> {
    match channel.find('(') {
        None => {
            if channel.is_empty() || channel.contains(')') {
                return Err(ConfigError::InvalidPattern(channel.to_string()));
            }
            Ok((channel, None))
        }
        Some(open) => {
            if !channel.ends_with(')') || open == 0 {
                return Err(ConfigError::InvalidPattern(channel.to_string()));
            }
            let qualifier = channel[open + 1..channel.len() - 1].trim();
            if qualifier.is_empty() || qualifier.contains('(') || qualifier.contains(')') {
                return Err(ConfigError::InvalidPattern(channel.to_string()));
            }
            Ok((&channel[..open], Some(qualifier.to_string())))
        }
    }
}

/// Attributed sender of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Character name
    pub name: String,
    /// Numeric character id, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
}

impl Character {
    /// Create a character
    pub fn new(name: &str, id: Option<u32>) -> Self {
        Self {
            name: name.to_string(),
            id,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Structured event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Event type, e.g. `online` or `tower-attack`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event-specific data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Optional human readable message, modifiers may change or clear it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Whether the path breadcrumb is rendered in front of the message
    #[serde(default = "default_true", rename = "renderPath")]
    pub render_path: bool,
}

impl EventPayload {
    /// Create an event without a message
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            data: None,
            message: None,
            render_path: true,
        }
    }

    /// Attach a message
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

/// Envelope payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum EnvelopeKind {
    /// Plain chat message
    Message(String),
    /// Structured event
    Event(EventPayload),
}

/// The unit routed through the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutableEnvelope {
    /// Payload
    #[serde(flatten)]
    pub kind: EnvelopeKind,
    /// Hops traversed, entry hop first
    pub path: Vec<Hop>,
    /// Sender, absent for systemic events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<Character>,
    /// Deliver without rendering
    #[serde(default, rename = "routeSilently")]
    pub route_silently: bool,
}

impl RoutableEnvelope {
    /// Create a chat message originating at `origin`
    pub fn message(origin: Hop, text: &str) -> Self {
        Self {
            kind: EnvelopeKind::Message(text.to_string()),
            path: vec![origin],
            character: None,
            route_silently: false,
        }
    }

    /// Create an event originating at `origin`
    pub fn event(origin: Hop, payload: EventPayload) -> Self {
        Self {
            kind: EnvelopeKind::Event(payload),
            path: vec![origin],
            character: None,
            route_silently: false,
        }
    }

    /// Attribute the envelope to a sender
    pub fn with_character(mut self, character: Character) -> Self {
        self.character = Some(character);
        self
    }

    /// The entry hop
    pub fn origin(&self) -> Option<&Hop> {
        self.path.first()
    }

    /// Check if this is an event
    pub fn is_event(&self) -> bool {
        matches!(self.kind, EnvelopeKind::Event(_))
    }

    /// Message text, or the event's embedded message
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EnvelopeKind::Message(text) => Some(text),
            EnvelopeKind::Event(event) => event.message.as_deref(),
        }
    }

    /// Mutable access to the message text or the event's embedded message
    pub fn text_mut(&mut self) -> Option<&mut String> {
        match &mut self.kind {
            EnvelopeKind::Message(text) => Some(text),
            EnvelopeKind::Event(event) => event.message.as_mut(),
        }
    }

    /// Append a hop at the tail
    pub fn push_hop(&mut self, hop: Hop) {
        self.path.push(hop);
    }

    /// Insert a hop in front of the path
    pub fn prepend_hop(&mut self, hop: Hop) {
        self.path.insert(0, hop);
    }

    /// Check if any hop is a relay
    pub fn came_via_relay(&self) -> bool {
        self.path.iter().any(|hop| hop.hop_type == HopType::Relay)
    }

    /// Hops recorded by this hub.
    ///
    /// An envelope that entered through a relay carries the remote bot's
    /// history behind the relay hop; those names belong to the remote side,
    /// so only the entry hop counts.
    pub fn local_hops(&self) -> &[Hop] {
        match self.path.first() {
            Some(first) if first.hop_type == HopType::Relay => &self.path[..1],
            _ => &self.path,
        }
    }

    /// Check if this hub already passed the envelope through this channel
    pub fn has_visited(&self, hop: &Hop) -> bool {
        self.local_hops().iter().any(|h| h.same_channel(hop))
    }
}
