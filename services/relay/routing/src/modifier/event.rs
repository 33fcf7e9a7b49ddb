//! Event suppression and silent routing

use super::{EventModifier, ModifierArgs};
use crate::envelope::{EnvelopeKind, RoutableEnvelope};
use crate::error::{ConfigError, ModifierError};
use crate::pattern::ChannelPattern;

/// Drop whole events of the given types, optionally only from one source
#[derive(Debug, Clone)]
pub struct RemoveEvent {
    types: Vec<String>,
    from: Option<ChannelPattern>,
}

impl RemoveEvent {
    /// Create the modifier
    pub fn new(types: &[String], from: Option<ChannelPattern>) -> Self {
        Self {
            types: types.iter().map(|t| t.to_lowercase()).collect(),
            from,
        }
    }

    pub(crate) fn build(args: &ModifierArgs<'_>) -> Result<Box<dyn EventModifier>, ModifierError> {
        args.allow_only(&["type", "from"])?;
        let types = args.required_strings("type")?;
        let from = match args.string("from")? {
            Some(pattern) => Some(ChannelPattern::parse(&pattern).map_err(|e: ConfigError| {
                ModifierError::InvalidValue {
                    modifier: args.modifier().to_string(),
                    argument: "from".to_string(),
                    expected: format!("a channel pattern ({})", e),
                }
            })?),
            None => None,
        };
        Ok(Box::new(Self::new(&types, from)))
    }
}

impl EventModifier for RemoveEvent {
    fn name(&self) -> &'static str {
        "remove-event"
    }

    fn modify(&self, envelope: RoutableEnvelope) -> Option<RoutableEnvelope> {
        let EnvelopeKind::Event(event) = &envelope.kind else {
            return Some(envelope);
        };
        if !self.types.contains(&event.event_type.to_lowercase()) {
            return Some(envelope);
        }
        let from_matches = match (&self.from, envelope.origin()) {
            (None, _) => true,
            (Some(pattern), Some(origin)) => pattern.matches(origin),
            (Some(_), None) => false,
        };
        if from_matches {
            None
        } else {
            Some(envelope)
        }
    }
}

/// Deliver without rendering the path
#[derive(Debug, Clone, Default)]
pub struct RouteSilently;

impl RouteSilently {
    pub(crate) fn build(args: &ModifierArgs<'_>) -> Result<Box<dyn EventModifier>, ModifierError> {
        args.allow_only(&[])?;
        Ok(Box::new(Self))
    }
}

impl EventModifier for RouteSilently {
    fn name(&self) -> &'static str {
        "route-silently"
    }

    fn modify(&self, mut envelope: RoutableEnvelope) -> Option<RoutableEnvelope> {
        envelope.route_silently = true;
        Some(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{EventPayload, Hop, HopType};

    fn event(kind: &str, origin: Hop) -> RoutableEnvelope {
        RoutableEnvelope::event(origin, EventPayload::new(kind))
    }

    #[test]
    fn test_remove_event_by_type() {
        let m = RemoveEvent::new(&["online".to_string(), "offline".to_string()], None);
        assert!(m.modify(event("Online", Hop::new(HopType::System, None))).is_none());
        assert!(m.modify(event("tower-attack", Hop::new(HopType::System, None))).is_some());
        let message = RoutableEnvelope::message(Hop::new(HopType::Org, None), "online");
        assert!(m.modify(message).is_some());
    }

    #[test]
    fn test_remove_event_from_source() {
        let from = ChannelPattern::parse("relay(*)").unwrap();
        let m = RemoveEvent::new(&["online".to_string()], Some(from));
        assert!(m.modify(event("online", Hop::named(HopType::Relay, "ally"))).is_none());
        assert!(m.modify(event("online", Hop::new(HopType::Org, None))).is_some());
    }

    #[test]
    fn test_route_silently_keeps_envelope() {
        let env = RoutableEnvelope::message(Hop::new(HopType::Org, None), "hi");
        let out = RouteSilently.modify(env).unwrap();
        assert!(out.route_silently);
        assert_eq!(out.text(), Some("hi"));
    }
}
