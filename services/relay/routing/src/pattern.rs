//! Channel patterns: `type`, `type(name)`, `type(*)` and globs like `relay(ally*)`

use crate::envelope::{split_channel, Hop, HopType};
use crate::error::ConfigError;
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone)]
enum Qualifier {
    /// Bare type: only hops without a name
    Unqualified,
    /// `type(*)`: any name, or none
    Any,
    /// Literal name, compared case-insensitively
    Exact(String),
    /// Name with `*` components
    Glob(Regex),
}

/// A parsed source or destination pattern
#[derive(Debug, Clone)]
pub struct ChannelPattern {
    raw: String,
    hop_type: HopType,
    qualifier: Qualifier,
}

impl ChannelPattern {
    /// Parse a pattern, rejecting unknown hop types
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let raw = pattern.trim();
        let (type_name, name) = split_channel(raw)?;
        let hop_type = HopType::parse(type_name)
            .ok_or_else(|| ConfigError::UnknownHopType(raw.to_string()))?;

        let canonical = match &name {
            Some(name) => format!("{}({})", hop_type, name),
            None => hop_type.to_string(),
        };

        let qualifier = match name {
            None => Qualifier::Unqualified,
            Some(name) if name == "*" => Qualifier::Any,
            Some(name) if name.contains('*') => {
                let body = name
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*");
                let re = Regex::new(&format!("(?i)^{}$", body))
                    .map_err(|_| ConfigError::InvalidPattern(raw.to_string()))?;
                Qualifier::Glob(re)
            }
            Some(name) => Qualifier::Exact(name),
        };

        Ok(Self {
            raw: canonical,
            hop_type,
            qualifier,
        })
    }

    /// The pattern as a channel string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Hop type this pattern selects
    pub fn hop_type(&self) -> HopType {
        self.hop_type
    }

    /// Check if the pattern can match more than one channel
    pub fn is_wildcard(&self) -> bool {
        matches!(self.qualifier, Qualifier::Any | Qualifier::Glob(_))
    }

    /// Check if a hop matches
    pub fn matches(&self, hop: &Hop) -> bool {
        if hop.hop_type != self.hop_type {
            return false;
        }
        match (&self.qualifier, &hop.name) {
            (Qualifier::Unqualified, name) => name.is_none(),
            (Qualifier::Any, _) => true,
            (Qualifier::Exact(expected), Some(name)) => expected.eq_ignore_ascii_case(name),
            (Qualifier::Glob(re), Some(name)) => re.is_match(name),
            (_, None) => false,
        }
    }

    /// Check if a concrete channel name like `priv(Mybot)` matches
    pub fn matches_channel(&self, channel: &str) -> bool {
        Hop::parse(channel).map(|hop| self.matches(&hop)).unwrap_or(false)
    }

    /// Rank used to pick the most specific of several matching patterns
    pub fn specificity(&self) -> u8 {
        match self.qualifier {
            Qualifier::Exact(_) | Qualifier::Unqualified => 3,
            Qualifier::Glob(_) => 2,
            Qualifier::Any => 1,
        }
    }
}

impl fmt::Display for ChannelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
