//! Route definitions and their persisted form

use crate::dsl;
use crate::error::DslError;
use crate::modifier::RouteModifier;
use relay_storage::{ArgumentRecord, ModifierRecord, RouteRecord};
use serde::{Deserialize, Serialize};

/// A rule sending envelopes from a source pattern to a destination pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Route id, 0 until the hub assigns one
    pub id: u64,
    /// Source channel pattern
    pub source: String,
    /// Destination channel pattern
    pub destination: String,
    /// Also applies with source and destination swapped
    pub two_way: bool,
    /// Modifiers in evaluation order
    pub modifiers: Vec<RouteModifier>,
}

impl Route {
    /// Create a one-way route without modifiers
    pub fn new(source: &str, destination: &str) -> Self {
        Self {
            id: 0,
            source: source.to_string(),
            destination: destination.to_string(),
            two_way: false,
            modifiers: Vec::new(),
        }
    }

    /// Make the route two-way
    pub fn two_way(mut self) -> Self {
        self.two_way = true;
        self
    }

    /// Append a modifier
    pub fn with_modifier(mut self, modifier: RouteModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Parse a route from its DSL form
    pub fn parse(definition: &str) -> Result<Self, DslError> {
        dsl::parse_route(definition)
    }

    /// Render as a `route add` command that parses back to this route
    pub fn to_dsl(&self) -> String {
        let arrow = if self.two_way { "<->" } else { "->" };
        let mut out = format!("route add {} {} {}", self.source, arrow, self.destination);
        for modifier in &self.modifiers {
            out.push(' ');
            out.push_str(&modifier.to_dsl());
        }
        out
    }

    /// Convert to the storage record
    pub fn to_record(&self) -> RouteRecord {
        RouteRecord {
            id: self.id,
            source: self.source.clone(),
            destination: self.destination.clone(),
            two_way: self.two_way,
            modifiers: self
                .modifiers
                .iter()
                .map(|m| ModifierRecord {
                    modifier: m.name.clone(),
                    arguments: m
                        .args
                        .iter()
                        .map(|(name, value)| ArgumentRecord {
                            name: name.clone(),
                            value: value.to_dsl(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Rebuild from a storage record
    pub fn from_record(record: &RouteRecord) -> Result<Self, DslError> {
        let modifiers = record
            .modifiers
            .iter()
            .map(|m| -> Result<RouteModifier, DslError> {
                let args = m
                    .arguments
                    .iter()
                    .map(|a| dsl::parse_value(&a.value).map(|value| (a.name.clone(), value)))
                    .collect::<Result<Vec<_>, DslError>>()?;
                Ok(RouteModifier {
                    name: m.modifier.clone(),
                    args,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: record.id,
            source: record.source.clone(),
            destination: record.destination.clone(),
            two_way: record.two_way,
            modifiers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::ArgValue;

    #[test]
    fn test_record_round_trip() {
        let route = Route::new("relay(*)", "org")
            .two_way()
            .with_modifier(
                RouteModifier::new("if-matches")
                    .arg("text", ArgValue::Str("true".into()))
                    .arg("text", ArgValue::Str("with \"quotes\"".into()))
                    .arg("regexp", ArgValue::Bool(false)),
            )
            .with_modifier(RouteModifier::new("route-silently"));

        let record = route.to_record();
        assert_eq!(record.modifiers[0].arguments[0].value, "\"true\"");
        assert_eq!(record.modifiers[0].arguments[2].value, "false");
        assert_eq!(Route::from_record(&record).unwrap(), route);
    }

    #[test]
    fn test_corrupt_record_value() {
        let mut record = Route::new("org", "console")
            .with_modifier(RouteModifier::new("if-not-command").arg("symbol", ArgValue::Str("!".into())))
            .to_record();
        record.modifiers[0].arguments[0].value = "\"unterminated".to_string();
        assert!(matches!(
            Route::from_record(&record),
            Err(DslError::UnterminatedString(_))
        ));
    }

    #[test]
    fn test_dsl_forms() {
        let route = Route::parse("org to console").unwrap();
        assert_eq!(route.to_dsl(), "route add org -> console");
        assert_eq!(Route::parse(&route.to_dsl()).unwrap(), route);
    }
}
