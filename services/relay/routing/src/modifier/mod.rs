//! Route modifiers.
//!
//! A modifier is a named filter or transform attached to a route. It sees
//! every envelope crossing that route and either returns it (possibly
//! changed) or drops it. Modifiers are built from a flat, ordered list of
//! typed arguments by factories registered in a [`ModifierRegistry`]; each
//! factory validates its own arguments so a bad route is rejected when it
//! is defined, not when the first message arrives.

mod change;
mod event;
mod matches;
mod prefix;
mod sender;

pub use change::{ChangeMessage, RemovePopups};
pub use event::{RemoveEvent, RouteSilently};
pub use matches::IfMatches;
pub use prefix::{IfHasPrefix, IfNotCommand};
pub use sender::IfNotBy;

use crate::envelope::RoutableEnvelope;
use crate::error::ModifierError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A filter or transform applied to envelopes crossing a route
pub trait EventModifier: Send + Sync + fmt::Debug {
    /// Registered name of the modifier
    fn name(&self) -> &'static str;

    /// Transform the envelope, or return `None` to drop it for this route
    fn modify(&self, envelope: RoutableEnvelope) -> Option<RoutableEnvelope>;
}

/// Typed modifier argument value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Integer
    Int(i64),
    /// Boolean
    Bool(bool),
    /// String, quoted or bare in the DSL
    Str(String),
}

impl ArgValue {
    /// Render as a DSL literal that parses back to the same value
    pub fn to_dsl(&self) -> String {
        match self {
            ArgValue::Int(i) => i.to_string(),
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::Str(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for c in s.chars() {
                    match c {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        c => out.push(c),
                    }
                }
                out.push('"');
                out
            }
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ArgValue::Int(_) => "an integer",
            ArgValue::Bool(_) => "a boolean",
            ArgValue::Str(_) => "a string",
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dsl())
    }
}

/// A modifier as configured on a route: name plus ordered arguments.
///
/// List arguments are expressed by repeating the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteModifier {
    /// Modifier name as written
    pub name: String,
    /// Arguments in definition order
    pub args: Vec<(String, ArgValue)>,
}

impl RouteModifier {
    /// Create a modifier definition without arguments
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, key: &str, value: ArgValue) -> Self {
        self.args.push((key.to_string(), value));
        self
    }

    /// Render as DSL, `name` or `name(key=value, ...)`
    pub fn to_dsl(&self) -> String {
        if self.args.is_empty() {
            return self.name.clone();
        }
        let args = self
            .args
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.to_dsl()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, args)
    }
}

/// Read-only view over a modifier's arguments used by factories
pub struct ModifierArgs<'a> {
    modifier: &'a str,
    args: &'a [(String, ArgValue)],
}

impl<'a> ModifierArgs<'a> {
    /// Wrap an argument list
    pub fn new(modifier: &'a str, args: &'a [(String, ArgValue)]) -> Self {
        Self { modifier, args }
    }

    /// Reject any argument not in `allowed`
    pub fn allow_only(&self, allowed: &[&str]) -> Result<(), ModifierError> {
        match self.args.iter().find(|(k, _)| !allowed.contains(&k.as_str())) {
            Some((key, _)) => Err(ModifierError::UnknownArgument {
                modifier: self.modifier.to_string(),
                argument: key.clone(),
            }),
            None => Ok(()),
        }
    }

    fn last(&self, key: &str) -> Option<&'a ArgValue> {
        self.args.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn invalid(&self, key: &str, expected: &str, found: &ArgValue) -> ModifierError {
        ModifierError::InvalidValue {
            modifier: self.modifier.to_string(),
            argument: key.to_string(),
            expected: format!("{}, got {}", expected, found.type_name()),
        }
    }

    /// Missing-argument error for `key`
    pub fn missing(&self, key: &str) -> ModifierError {
        ModifierError::MissingArgument {
            modifier: self.modifier.to_string(),
            argument: key.to_string(),
        }
    }

    /// Generic validation error
    pub fn invalid_combination(&self, reason: &str) -> ModifierError {
        ModifierError::Invalid {
            modifier: self.modifier.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Boolean argument with a default
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ModifierError> {
        match self.last(key) {
            None => Ok(default),
            Some(ArgValue::Bool(b)) => Ok(*b),
            Some(other) => Err(self.invalid(key, "a boolean", other)),
        }
    }

    /// Optional string argument
    pub fn string(&self, key: &str) -> Result<Option<String>, ModifierError> {
        match self.last(key) {
            None => Ok(None),
            Some(ArgValue::Str(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.invalid(key, "a string", other)),
        }
    }

    /// String argument with a default
    pub fn string_or(&self, key: &str, default: &str) -> Result<String, ModifierError> {
        Ok(self.string(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// All values of a repeated string argument, in order
    pub fn strings(&self, key: &str) -> Result<Vec<String>, ModifierError> {
        self.args
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| match v {
                ArgValue::Str(s) => Ok(s.clone()),
                other => Err(self.invalid(key, "a string", other)),
            })
            .collect()
    }

    /// Repeated string argument that must occur at least once
    pub fn required_strings(&self, key: &str) -> Result<Vec<String>, ModifierError> {
        let values = self.strings(key)?;
        if values.is_empty() {
            return Err(self.missing(key));
        }
        Ok(values)
    }

    /// Name of the modifier being built
    pub fn modifier(&self) -> &str {
        self.modifier
    }
}

/// Factory building a modifier from its arguments
pub type ModifierFactory =
    fn(&ModifierArgs<'_>) -> Result<Box<dyn EventModifier>, ModifierError>;

#[derive(Clone, Copy)]
struct RegistryEntry {
    factory: ModifierFactory,
    description: &'static str,
}

/// Maps modifier names to their factories
#[derive(Clone)]
pub struct ModifierRegistry {
    factories: HashMap<String, RegistryEntry>,
}

impl ModifierRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding all standard modifiers
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(
            "if-has-prefix",
            "Only pass messages starting with a prefix",
            IfHasPrefix::build,
        );
        registry.alias("require-prefix", "if-has-prefix");
        registry.register(
            "if-matches",
            "Only pass messages containing a text or matching a pattern",
            IfMatches::build,
        );
        registry.register(
            "if-not-by",
            "Drop messages sent by certain characters",
            IfNotBy::build,
        );
        registry.register(
            "if-not-command",
            "Drop messages that are commands",
            IfNotCommand::build,
        );
        registry.register(
            "change-message",
            "Search and replace text or add a prefix",
            ChangeMessage::build,
        );
        registry.register(
            "remove-event",
            "Drop events of certain types",
            RemoveEvent::build,
        );
        registry.register(
            "remove-popups",
            "Replace links by their text",
            RemovePopups::build,
        );
        registry.register(
            "route-silently",
            "Deliver without rendering the path",
            RouteSilently::build,
        );
        registry
    }

    /// Register a factory under `name`, replacing any previous one
    pub fn register(&mut self, name: &str, description: &'static str, factory: ModifierFactory) {
        self.factories.insert(
            name.to_string(),
            RegistryEntry {
                factory,
                description,
            },
        );
    }

    /// Make `alias` build the same modifier as `target`
    pub fn alias(&mut self, alias: &str, target: &str) {
        if let Some(entry) = self.factories.get(target).copied() {
            self.factories.insert(alias.to_string(), entry);
        }
    }

    /// Check if a modifier name is known
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names with descriptions, sorted
    pub fn names(&self) -> Vec<(String, &'static str)> {
        let mut names: Vec<_> = self
            .factories
            .iter()
            .map(|(name, entry)| (name.clone(), entry.description))
            .collect();
        names.sort();
        names
    }

    /// Build a modifier from its definition
    pub fn build(&self, definition: &RouteModifier) -> Result<Box<dyn EventModifier>, ModifierError> {
        let entry = self
            .factories
            .get(&definition.name)
            .ok_or_else(|| ModifierError::Unknown(definition.name.clone()))?;
        (entry.factory)(&ModifierArgs::new(&definition.name, &definition.args))
    }
}

impl Default for ModifierRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
