//! Prefix based filters

use super::{EventModifier, ModifierArgs};
use crate::envelope::{EnvelopeKind, RoutableEnvelope};
use crate::error::ModifierError;

/// Only pass messages starting with a prefix, optionally stripping it.
///
/// Events are never dropped: when `for-events` is set, an event whose
/// embedded message fails the test has its message cleared instead.
#[derive(Debug, Clone)]
pub struct IfHasPrefix {
    prefix: String,
    trim: bool,
    inverse: bool,
    for_events: bool,
    for_relays: bool,
}

impl IfHasPrefix {
    /// Create the modifier
    pub fn new(prefix: &str, trim: bool, inverse: bool, for_events: bool, for_relays: bool) -> Self {
        Self {
            prefix: prefix.to_string(),
            trim,
            inverse,
            for_events,
            for_relays,
        }
    }

    pub(crate) fn build(args: &ModifierArgs<'_>) -> Result<Box<dyn EventModifier>, ModifierError> {
        args.allow_only(&["prefix", "trim", "inverse", "for-events", "for-relays"])?;
        let prefix = args.string_or("prefix", "-")?;
        if prefix.is_empty() {
            return Err(args.invalid_combination("prefix must not be empty"));
        }
        Ok(Box::new(Self::new(
            &prefix,
            args.bool_or("trim", true)?,
            args.bool_or("inverse", false)?,
            args.bool_or("for-events", true)?,
            args.bool_or("for-relays", true)?,
        )))
    }

    /// Apply the test to one text; `None` means it failed
    fn check(&self, text: &str) -> Option<String> {
        let has = text.starts_with(&self.prefix);
        if has == self.inverse {
            return None;
        }
        if has && self.trim {
            return Some(text[self.prefix.len()..].trim_start().to_string());
        }
        Some(text.to_string())
    }
}

impl EventModifier for IfHasPrefix {
    fn name(&self) -> &'static str {
        "if-has-prefix"
    }

    fn modify(&self, mut envelope: RoutableEnvelope) -> Option<RoutableEnvelope> {
        if !self.for_relays && envelope.came_via_relay() {
            return Some(envelope);
        }
        match &mut envelope.kind {
            EnvelopeKind::Message(text) => {
                *text = self.check(text)?;
            }
            EnvelopeKind::Event(event) => {
                if !self.for_events {
                    return Some(envelope);
                }
                if let Some(message) = event.message.take() {
                    event.message = self.check(&message);
                }
            }
        }
        Some(envelope)
    }
}

/// Drop messages that look like commands
#[derive(Debug, Clone)]
pub struct IfNotCommand {
    symbol: String,
}

impl IfNotCommand {
    /// Create the modifier
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
        }
    }

    pub(crate) fn build(args: &ModifierArgs<'_>) -> Result<Box<dyn EventModifier>, ModifierError> {
        args.allow_only(&["symbol"])?;
        let symbol = args.string_or("symbol", "!")?;
        if symbol.is_empty() {
            return Err(args.invalid_combination("symbol must not be empty"));
        }
        Ok(Box::new(Self::new(&symbol)))
    }
}

impl EventModifier for IfNotCommand {
    fn name(&self) -> &'static str {
        "if-not-command"
    }

    fn modify(&self, envelope: RoutableEnvelope) -> Option<RoutableEnvelope> {
        match &envelope.kind {
            EnvelopeKind::Message(text) if text.trim_start().starts_with(&self.symbol) => None,
            _ => Some(envelope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{EventPayload, Hop, HopType};

    fn msg(text: &str) -> RoutableEnvelope {
        RoutableEnvelope::message(Hop::named(HopType::Priv, "Bot"), text)
    }

    #[test]
    fn test_prefix_strips_and_filters() {
        let m = IfHasPrefix::new("!", true, false, true, true);
        assert_eq!(m.modify(msg("!hi")).unwrap().text(), Some("hi"));
        assert_eq!(m.modify(msg("! hi")).unwrap().text(), Some("hi"));
        assert!(m.modify(msg("hi")).is_none());

        let keep = IfHasPrefix::new("!", false, false, true, true);
        assert_eq!(keep.modify(msg("!hi")).unwrap().text(), Some("!hi"));
    }

    #[test]
    fn test_prefix_inverse() {
        let m = IfHasPrefix::new("-", true, true, true, true);
        assert!(m.modify(msg("-secret")).is_none());
        assert_eq!(m.modify(msg("public")).unwrap().text(), Some("public"));
    }

    #[test]
    fn test_prefix_events_clear_message() {
        let m = IfHasPrefix::new("!", true, false, true, true);
        let event = RoutableEnvelope::event(
            Hop::new(HopType::System, None),
            EventPayload::new("online").with_message("Nady logged on"),
        );
        let out = m.modify(event.clone()).unwrap();
        assert!(out.is_event());
        assert_eq!(out.text(), None);

        let ignore_events = IfHasPrefix::new("!", true, false, false, true);
        assert_eq!(ignore_events.modify(event).unwrap().text(), Some("Nady logged on"));
    }

    #[test]
    fn test_prefix_skips_relayed_when_disabled() {
        let m = IfHasPrefix::new("!", true, false, true, false);
        let mut relayed = msg("no prefix");
        relayed.prepend_hop(Hop::named(HopType::Relay, "alliance"));
        assert_eq!(m.modify(relayed).unwrap().text(), Some("no prefix"));
        assert!(m.modify(msg("no prefix")).is_none());
    }

    #[test]
    fn test_not_command() {
        let m = IfNotCommand::new("!");
        assert!(m.modify(msg("!online")).is_none());
        assert!(m.modify(msg("hello !")).is_some());
    }
}
