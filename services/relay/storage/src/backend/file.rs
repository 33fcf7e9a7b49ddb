//! File-based storage backend: one JSON document rewritten atomically

use crate::{
    HopColorRecord, HopFormatRecord, RouteRecord, RouteStore, RoutingSnapshot, StorageError,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// File-backed route store.
///
/// The full state is kept in memory and the file is replaced (write to a
/// temporary file, then rename) after every mutation.
pub struct FileRouteStore {
    path: PathBuf,
    state: Mutex<RoutingSnapshot>,
}

impl FileRouteStore {
    /// Open a store, loading existing state if the file exists
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => RoutingSnapshot::default(),
            Ok(bytes) => serde_json::from_slice::<RoutingSnapshot>(&bytes).map_err(|e| {
                StorageError::Corruption(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RoutingSnapshot::default(),
            Err(e) => return Err(e.into()),
        };

        info!(
            "Opened route store {:?}: {} routes, {} colors, {} formats",
            path,
            state.routes.len(),
            state.colors.len(),
            state.formats.len()
        );

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &RoutingSnapshot) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Persisted route store to {:?} ({} bytes)", self.path, bytes.len());
        Ok(())
    }
}

#[async_trait]
impl RouteStore for FileRouteStore {
    async fn load(&self) -> Result<RoutingSnapshot, StorageError> {
        Ok(self.state.lock().await.clone())
    }

    async fn insert_route(&self, mut route: RouteRecord) -> Result<u64, StorageError> {
        let mut state = self.state.lock().await;
        let id = state.routes.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        route.id = id;
        state.routes.push(route);
        self.persist(&state).await?;
        Ok(id)
    }

    async fn delete_route(&self, id: u64) -> Result<bool, StorageError> {
        let mut state = self.state.lock().await;
        let before = state.routes.len();
        state.routes.retain(|r| r.id != id);
        if state.routes.len() == before {
            return Ok(false);
        }
        self.persist(&state).await?;
        Ok(true)
    }

    async fn upsert_color(&self, color: HopColorRecord) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        state
            .colors
            .retain(|c| !(c.hop == color.hop && c.where_to == color.where_to));
        state.colors.push(color);
        self.persist(&state).await
    }

    async fn delete_color(&self, hop: &str, where_to: Option<&str>) -> Result<bool, StorageError> {
        let mut state = self.state.lock().await;
        let before = state.colors.len();
        state
            .colors
            .retain(|c| !(c.hop == hop && c.where_to.as_deref() == where_to));
        if state.colors.len() == before {
            return Ok(false);
        }
        self.persist(&state).await?;
        Ok(true)
    }

    async fn upsert_format(&self, format: HopFormatRecord) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        state.formats.retain(|f| f.hop != format.hop);
        state.formats.push(format);
        self.persist(&state).await
    }

    async fn delete_format(&self, hop: &str) -> Result<bool, StorageError> {
        let mut state = self.state.lock().await;
        let before = state.formats.len();
        state.formats.retain(|f| f.hop != hop);
        if state.formats.len() == before {
            return Ok(false);
        }
        self.persist(&state).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArgumentRecord, ModifierRecord};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("routing").join("state.json");

        let store = FileRouteStore::open(&path).await.unwrap();
        let id = store
            .insert_route(RouteRecord {
                id: 0,
                source: "relay(alliance)".to_string(),
                destination: "org".to_string(),
                two_way: true,
                modifiers: vec![ModifierRecord {
                    modifier: "route-silently".to_string(),
                    arguments: vec![],
                }],
            })
            .await
            .unwrap();
        store
            .upsert_color(HopColorRecord {
                hop: "org".to_string(),
                where_to: Some("relay(alliance)".to_string()),
                tag_color: None,
                text_color: Some("#AAAAAA".to_string()),
            })
            .await
            .unwrap();
        drop(store);

        let reopened = FileRouteStore::open(&path).await.unwrap();
        let snapshot = reopened.load().await.unwrap();
        assert_eq!(snapshot.routes.len(), 1);
        assert_eq!(snapshot.routes[0].id, id);
        assert!(snapshot.routes[0].two_way);
        assert_eq!(snapshot.colors[0].where_to.as_deref(), Some("relay(alliance)"));

        assert!(reopened.delete_route(id).await.unwrap());
        let again = FileRouteStore::open(&path).await.unwrap();
        assert!(again.load().await.unwrap().routes.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let result = FileRouteStore::open(&path).await;
        assert!(matches!(result, Err(StorageError::Corruption(_))));
    }

    #[tokio::test]
    async fn test_ids_keep_increasing() {
        let dir = TempDir::new().unwrap();
        let store = FileRouteStore::open(dir.path().join("s.json")).await.unwrap();
        let record = RouteRecord {
            id: 0,
            source: "org".to_string(),
            destination: "console".to_string(),
            two_way: false,
            modifiers: vec![ModifierRecord {
                modifier: "if-matches".to_string(),
                arguments: vec![ArgumentRecord {
                    name: "text".to_string(),
                    value: "\"x\"".to_string(),
                }],
            }],
        };
        let a = store.insert_route(record.clone()).await.unwrap();
        let b = store.insert_route(record).await.unwrap();
        assert_eq!(b, a + 1);
    }
}
