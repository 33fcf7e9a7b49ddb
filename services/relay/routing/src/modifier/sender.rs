//! Sender based filter

use super::{EventModifier, ModifierArgs};
use crate::envelope::RoutableEnvelope;
use crate::error::ModifierError;

/// Drop messages sent by any of the listed characters.
///
/// With `inverse`, only messages by the listed characters pass; envelopes
/// without a sender are then dropped.
#[derive(Debug, Clone)]
pub struct IfNotBy {
    senders: Vec<String>,
    inverse: bool,
}

impl IfNotBy {
    /// Create the modifier
    pub fn new(senders: &[String], inverse: bool) -> Self {
        Self {
            senders: senders.iter().map(|s| s.to_lowercase()).collect(),
            inverse,
        }
    }

    pub(crate) fn build(args: &ModifierArgs<'_>) -> Result<Box<dyn EventModifier>, ModifierError> {
        args.allow_only(&["sender", "inverse"])?;
        let senders = args.required_strings("sender")?;
        Ok(Box::new(Self::new(&senders, args.bool_or("inverse", false)?)))
    }
}

impl EventModifier for IfNotBy {
    fn name(&self) -> &'static str {
        "if-not-by"
    }

    fn modify(&self, envelope: RoutableEnvelope) -> Option<RoutableEnvelope> {
        let by_listed = envelope
            .character
            .as_ref()
            .map(|c| self.senders.contains(&c.name.to_lowercase()))
            .unwrap_or(false);
        if by_listed != self.inverse {
            return None;
        }
        Some(envelope)
    }
}
