//! Routing error types.

use relay_storage::StorageError;
use thiserror::Error;

/// Errors raised while constructing a modifier from its arguments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModifierError {
    /// No modifier registered under this name
    #[error("unknown modifier '{0}'")]
    Unknown(String),
    /// Argument not accepted by the modifier
    #[error("{modifier}: unknown argument '{argument}'")]
    UnknownArgument {
        /// Modifier name
        modifier: String,
        /// Offending argument
        argument: String,
    },
    /// Required argument missing
    #[error("{modifier}: missing argument '{argument}'")]
    MissingArgument {
        /// Modifier name
        modifier: String,
        /// Missing argument
        argument: String,
    },
    /// Argument has the wrong type or value
    #[error("{modifier}: argument '{argument}' must be {expected}")]
    InvalidValue {
        /// Modifier name
        modifier: String,
        /// Offending argument
        argument: String,
        /// What was expected
        expected: String,
    },
    /// Regular expression does not compile
    #[error("{modifier}: invalid regular expression '{pattern}': {reason}")]
    InvalidRegex {
        /// Modifier name
        modifier: String,
        /// The pattern
        pattern: String,
        /// Compiler message
        reason: String,
    },
    /// Argument combination is not valid
    #[error("{modifier}: {reason}")]
    Invalid {
        /// Modifier name
        modifier: String,
        /// What is wrong
        reason: String,
    },
}

/// Errors raised while parsing the route definition language
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DslError {
    /// Input ended early
    #[error("unexpected end of input, expected {0}")]
    UnexpectedEnd(String),
    /// Unexpected character or word
    #[error("at position {pos}: expected {expected}, found '{found}'")]
    Unexpected {
        /// Character offset
        pos: usize,
        /// What the parser wanted
        expected: String,
        /// What it saw
        found: String,
    },
    /// String literal without closing quote
    #[error("unterminated string starting at position {0}")]
    UnterminatedString(usize),
    /// Integer literal out of range
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

/// Configuration errors: rejected synchronously, never silently accepted
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Channel pattern is syntactically invalid
    #[error("invalid channel pattern '{0}'")]
    InvalidPattern(String),
    /// Channel type is not one of the known hop types
    #[error("unknown hop type in '{0}'")]
    UnknownHopType(String),
    /// Destination matches no receiver and is not a wildcard
    #[error("destination '{0}' is not reachable: no receiver matches it")]
    UnreachableDestination(String),
    /// Receiver already registered and overwrite not requested
    #[error("receiver '{0}' is already registered")]
    DuplicateReceiver(String),
    /// Emitter already registered and overwrite not requested
    #[error("emitter '{0}' is already registered")]
    DuplicateEmitter(String),
    /// No route with this id
    #[error("route {0} not found")]
    RouteNotFound(u64),
    /// Color value is not `#RRGGBB`
    #[error("invalid color '{0}', expected #RRGGBB")]
    InvalidColor(String),
    /// Modifier construction failed
    #[error(transparent)]
    Modifier(#[from] ModifierError),
    /// Route definition did not parse
    #[error("route definition: {0}")]
    Dsl(#[from] DslError),
    /// Persisting the change failed
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}
