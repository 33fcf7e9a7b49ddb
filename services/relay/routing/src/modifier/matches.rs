//! Text matching filter

use super::{EventModifier, ModifierArgs};
use crate::envelope::RoutableEnvelope;
use crate::error::ModifierError;
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
enum Matcher {
    Substring { needle: String, case_sensitive: bool },
    Pattern(Regex),
}

impl Matcher {
    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Substring {
                needle,
                case_sensitive: true,
            } => text.contains(needle.as_str()),
            Matcher::Substring { needle, .. } => text.to_lowercase().contains(needle.as_str()),
            Matcher::Pattern(re) => re.is_match(text),
        }
    }
}

/// Only pass messages containing any of several texts (or matching a pattern)
#[derive(Debug, Clone)]
pub struct IfMatches {
    matchers: Vec<Matcher>,
    inverse: bool,
}

impl IfMatches {
    /// Create the modifier; invalid regular expressions are rejected
    pub fn new(
        texts: &[String],
        case_sensitive: bool,
        regexp: bool,
        inverse: bool,
    ) -> Result<Self, ModifierError> {
        let matchers = texts
            .iter()
            .map(|text| {
                if regexp {
                    RegexBuilder::new(text)
                        .case_insensitive(!case_sensitive)
                        .build()
                        .map(Matcher::Pattern)
                        .map_err(|e| ModifierError::InvalidRegex {
                            modifier: "if-matches".to_string(),
                            pattern: text.clone(),
                            reason: e.to_string(),
                        })
                } else if case_sensitive {
                    Ok(Matcher::Substring {
                        needle: text.clone(),
                        case_sensitive,
                    })
                } else {
                    Ok(Matcher::Substring {
                        needle: text.to_lowercase(),
                        case_sensitive,
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers, inverse })
    }

    pub(crate) fn build(args: &ModifierArgs<'_>) -> Result<Box<dyn EventModifier>, ModifierError> {
        args.allow_only(&["text", "case-sensitive", "regexp", "inverse"])?;
        let texts = args.required_strings("text")?;
        Ok(Box::new(Self::new(
            &texts,
            args.bool_or("case-sensitive", false)?,
            args.bool_or("regexp", false)?,
            args.bool_or("inverse", false)?,
        )?))
    }
}

impl EventModifier for IfMatches {
    fn name(&self) -> &'static str {
        "if-matches"
    }

    fn modify(&self, envelope: RoutableEnvelope) -> Option<RoutableEnvelope> {
        // Events without a message have nothing to test
        let Some(text) = envelope.text() else {
            return Some(envelope);
        };
        let matched = self.matchers.iter().any(|m| m.is_match(text));
        if matched == self.inverse {
            return None;
        }
        Some(envelope)
    }
}
