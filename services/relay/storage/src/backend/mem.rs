//! In-memory storage backend for development and testing

use crate::{
    HopColorRecord, HopFormatRecord, RouteRecord, RouteStore, RoutingSnapshot, StorageError,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

type ColorKey = (String, Option<String>);

/// In-memory route store
pub struct MemoryRouteStore {
    /// Routes by id
    routes: Arc<DashMap<u64, RouteRecord>>,
    /// Color overrides by (hop, where_to)
    colors: Arc<DashMap<ColorKey, HopColorRecord>>,
    /// Formats by hop
    formats: Arc<DashMap<String, HopFormatRecord>>,
    /// Next route id to assign
    next_id: AtomicU64,
}

impl MemoryRouteStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            routes: Arc::new(DashMap::new()),
            colors: Arc::new(DashMap::new()),
            formats: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryRouteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteStore for MemoryRouteStore {
    async fn load(&self) -> Result<RoutingSnapshot, StorageError> {
        let mut routes: Vec<RouteRecord> = self.routes.iter().map(|e| e.value().clone()).collect();
        routes.sort_by_key(|r| r.id);
        Ok(RoutingSnapshot {
            routes,
            colors: self.colors.iter().map(|e| e.value().clone()).collect(),
            formats: self.formats.iter().map(|e| e.value().clone()).collect(),
        })
    }

    async fn insert_route(&self, mut route: RouteRecord) -> Result<u64, StorageError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        route.id = id;
        debug!("Store insert route {}: {} -> {}", id, route.source, route.destination);
        self.routes.insert(id, route);
        Ok(id)
    }

    async fn delete_route(&self, id: u64) -> Result<bool, StorageError> {
        Ok(self.routes.remove(&id).is_some())
    }

    async fn upsert_color(&self, color: HopColorRecord) -> Result<(), StorageError> {
        self.colors
            .insert((color.hop.clone(), color.where_to.clone()), color);
        Ok(())
    }

    async fn delete_color(&self, hop: &str, where_to: Option<&str>) -> Result<bool, StorageError> {
        let key = (hop.to_string(), where_to.map(str::to_string));
        Ok(self.colors.remove(&key).is_some())
    }

    async fn upsert_format(&self, format: HopFormatRecord) -> Result<(), StorageError> {
        self.formats.insert(format.hop.clone(), format);
        Ok(())
    }

    async fn delete_format(&self, hop: &str) -> Result<bool, StorageError> {
        Ok(self.formats.remove(hop).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArgumentRecord, ModifierRecord};

    fn route(source: &str, destination: &str) -> RouteRecord {
        RouteRecord {
            id: 0,
            source: source.to_string(),
            destination: destination.to_string(),
            two_way: false,
            modifiers: vec![ModifierRecord {
                modifier: "if-has-prefix".to_string(),
                arguments: vec![ArgumentRecord {
                    name: "prefix".to_string(),
                    value: "\"!\"".to_string(),
                }],
            }],
        }
    }

    #[tokio::test]
    async fn test_memory_routes() {
        let store = MemoryRouteStore::new();

        let a = store.insert_route(route("org", "priv(*)")).await.unwrap();
        let b = store.insert_route(route("priv(*)", "org")).await.unwrap();
        assert!(b > a);

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.routes.len(), 2);
        assert_eq!(snapshot.routes[0].id, a);
        assert_eq!(snapshot.routes[0].modifiers[0].arguments[0].value, "\"!\"");

        assert!(store.delete_route(a).await.unwrap());
        assert!(!store.delete_route(a).await.unwrap());
        assert_eq!(store.load().await.unwrap().routes.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_colors_and_formats() {
        let store = MemoryRouteStore::new();
        let color = HopColorRecord {
            hop: "relay(alliance)".to_string(),
            where_to: None,
            tag_color: Some("#FF0000".to_string()),
            text_color: None,
        };
        store.upsert_color(color.clone()).await.unwrap();
        store
            .upsert_color(HopColorRecord {
                tag_color: Some("#00FF00".to_string()),
                ..color
            })
            .await
            .unwrap();

        store
            .upsert_format(HopFormatRecord {
                hop: "org".to_string(),
                render: false,
                format: "%s".to_string(),
            })
            .await
            .unwrap();

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.colors.len(), 1);
        assert_eq!(snapshot.colors[0].tag_color.as_deref(), Some("#00FF00"));
        assert_eq!(snapshot.formats.len(), 1);

        assert!(store.delete_color("relay(alliance)", None).await.unwrap());
        assert!(store.delete_format("org").await.unwrap());
        assert!(!store.delete_format("org").await.unwrap());
    }
}
