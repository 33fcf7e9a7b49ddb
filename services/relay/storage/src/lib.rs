//! Persisted routing state for the relay hub.
//!
//! This crate stores everything the message hub needs to rebuild its rule
//! table after a restart: routes, their ordered modifiers and arguments,
//! per-hop color overrides and per-hop display formats. The whole state is
//! loaded once at startup and written through on every mutation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corruption(String),
    /// Entry not found
    #[error("Entry not found")]
    NotFound,
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One persisted modifier argument.
///
/// `value` holds the literal as written in the route DSL (`"quoted"`,
/// `true`, `42`, `bare`) so the typed value can be rebuilt exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentRecord {
    /// Argument name
    pub name: String,
    /// DSL literal
    pub value: String,
}

/// One persisted modifier of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierRecord {
    /// Registered modifier name
    pub modifier: String,
    /// Arguments in definition order
    #[serde(default)]
    pub arguments: Vec<ArgumentRecord>,
}

/// A persisted route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    /// Route id (assigned by the store)
    pub id: u64,
    /// Source channel pattern
    pub source: String,
    /// Destination channel pattern
    pub destination: String,
    /// Whether the route also applies in reverse
    #[serde(default)]
    pub two_way: bool,
    /// Modifiers in evaluation order
    #[serde(default)]
    pub modifiers: Vec<ModifierRecord>,
}

/// A persisted color override for a hop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopColorRecord {
    /// Hop pattern, e.g. `relay(alliance)` or `priv(*)`
    pub hop: String,
    /// Only applies when rendering into this channel
    #[serde(default)]
    pub where_to: Option<String>,
    /// Color of the rendered hop tag (`#RRGGBB`)
    #[serde(default)]
    pub tag_color: Option<String>,
    /// Color of the message text (`#RRGGBB`)
    #[serde(default)]
    pub text_color: Option<String>,
}

/// A persisted display format for a hop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopFormatRecord {
    /// Hop pattern
    pub hop: String,
    /// Whether the hop is rendered at all
    pub render: bool,
    /// Display format, `%s` is replaced by the hop label
    pub format: String,
}

/// Everything loaded at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSnapshot {
    /// Routes ordered by id
    #[serde(default)]
    pub routes: Vec<RouteRecord>,
    /// Color overrides
    #[serde(default)]
    pub colors: Vec<HopColorRecord>,
    /// Display formats
    #[serde(default)]
    pub formats: Vec<HopFormatRecord>,
}

/// Route storage trait
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Load the complete routing state
    async fn load(&self) -> Result<RoutingSnapshot, StorageError>;

    /// Persist a new route and return its assigned id (`route.id` is ignored)
    async fn insert_route(&self, route: RouteRecord) -> Result<u64, StorageError>;

    /// Delete a route, returning whether it existed
    async fn delete_route(&self, id: u64) -> Result<bool, StorageError>;

    /// Insert or replace the color override for `(hop, where_to)`
    async fn upsert_color(&self, color: HopColorRecord) -> Result<(), StorageError>;

    /// Delete the color override for `(hop, where_to)`
    async fn delete_color(&self, hop: &str, where_to: Option<&str>) -> Result<bool, StorageError>;

    /// Insert or replace the format for `hop`
    async fn upsert_format(&self, format: HopFormatRecord) -> Result<(), StorageError>;

    /// Delete the format for `hop`
    async fn delete_format(&self, hop: &str) -> Result<bool, StorageError>;
}

/// Storage backend configuration
#[derive(Clone, Debug, Default)]
pub enum StorageMode {
    /// In-memory storage (dev/tests only)
    #[default]
    InMemory,
    /// JSON file rewritten on every mutation
    File {
        /// Path of the state file
        path: PathBuf,
    },
}

// Re-export backend implementations
pub use backend::file::FileRouteStore;
pub use backend::mem::MemoryRouteStore;

/// Create a store from configuration
pub async fn open_store(mode: StorageMode) -> Result<Arc<dyn RouteStore>, StorageError> {
    match mode {
        StorageMode::InMemory => Ok(Arc::new(MemoryRouteStore::new())),
        StorageMode::File { path } => Ok(Arc::new(FileRouteStore::open(path).await?)),
    }
}
