//! Text rewriting modifiers

use super::{EventModifier, ModifierArgs};
use crate::envelope::RoutableEnvelope;
use crate::error::ModifierError;
use regex::Regex;

#[derive(Debug, Clone)]
enum Replacement {
    Literal { search: String, replace: String },
    Pattern { regex: Regex, replace: String },
}

/// Search-and-replace on the message text plus an optional prefix
#[derive(Debug, Clone)]
pub struct ChangeMessage {
    add_prefix: Option<String>,
    replacement: Option<Replacement>,
}

impl ChangeMessage {
    /// Create the modifier
    pub fn new(
        add_prefix: Option<String>,
        search: Option<String>,
        replace: Option<String>,
        regexp: bool,
    ) -> Result<Self, ModifierError> {
        let invalid = |reason: &str| ModifierError::Invalid {
            modifier: "change-message".to_string(),
            reason: reason.to_string(),
        };
        let replacement = match (search, replace) {
            (Some(search), Some(replace)) if regexp => {
                let regex = Regex::new(&search).map_err(|e| ModifierError::InvalidRegex {
                    modifier: "change-message".to_string(),
                    pattern: search.clone(),
                    reason: e.to_string(),
                })?;
                Some(Replacement::Pattern { regex, replace })
            }
            (Some(search), Some(replace)) => {
                if search.is_empty() {
                    return Err(invalid("search must not be empty"));
                }
                Some(Replacement::Literal { search, replace })
            }
            (Some(_), None) => return Err(invalid("search requires replace")),
            (None, Some(_)) => return Err(invalid("replace requires search")),
            (None, None) => None,
        };
        if add_prefix.is_none() && replacement.is_none() {
            return Err(invalid("need add-prefix or search/replace"));
        }
        Ok(Self {
            add_prefix,
            replacement,
        })
    }

    pub(crate) fn build(args: &ModifierArgs<'_>) -> Result<Box<dyn EventModifier>, ModifierError> {
        args.allow_only(&["add-prefix", "search", "replace", "regexp"])?;
        Ok(Box::new(Self::new(
            args.string("add-prefix")?,
            args.string("search")?,
            args.string("replace")?,
            args.bool_or("regexp", false)?,
        )?))
    }

    fn rewrite(&self, text: &str) -> String {
        let replaced = match &self.replacement {
            Some(Replacement::Literal { search, replace }) => text.replace(search.as_str(), replace),
            Some(Replacement::Pattern { regex, replace }) => {
                regex.replace_all(text, replace.as_str()).into_owned()
            }
            None => text.to_string(),
        };
        match &self.add_prefix {
            Some(prefix) => format!("{}{}", prefix, replaced),
            None => replaced,
        }
    }
}

impl EventModifier for ChangeMessage {
    fn name(&self) -> &'static str {
        "change-message"
    }

    fn modify(&self, mut envelope: RoutableEnvelope) -> Option<RoutableEnvelope> {
        if let Some(text) = envelope.text_mut() {
            *text = self.rewrite(text);
        }
        Some(envelope)
    }
}

/// Replace `<a href=...>text</a>` links by their text
#[derive(Debug, Clone)]
pub struct RemovePopups {
    link: Regex,
}

impl RemovePopups {
    /// Create the modifier
    pub fn new() -> Result<Self, ModifierError> {
        let link = Regex::new(r#"(?is)<a\s+href\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]*)[^>]*>(.*?)</a>"#)
            .map_err(|e| ModifierError::Invalid {
                modifier: "remove-popups".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { link })
    }

    pub(crate) fn build(args: &ModifierArgs<'_>) -> Result<Box<dyn EventModifier>, ModifierError> {
        args.allow_only(&[])?;
        Ok(Box::new(Self::new()?))
    }
}

impl EventModifier for RemovePopups {
    fn name(&self) -> &'static str {
        "remove-popups"
    }

    fn modify(&self, mut envelope: RoutableEnvelope) -> Option<RoutableEnvelope> {
        if let Some(text) = envelope.text_mut() {
            *text = self.link.replace_all(text, "$1").into_owned();
        }
        Some(envelope)
    }
}
