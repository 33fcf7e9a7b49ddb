//! Configuration handling for the relay hub.
//!
//! Settings come from a YAML file, then `RELAY_*` environment variables
//! override individual values.

use anyhow::{bail, Context, Result};
use relay_session::{ProtocolConfig, RelayLinkConfig, StackConfig};
use relay_storage::StorageMode;
use relay_wire::{ChunkConfig, DEFAULT_CHUNK_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Relay hub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Where routes, colors and formats are persisted
    pub storage: StorageConfig,
    /// Default render colors
    pub colors: ColorConfig,
    /// Settings shared by every relay link
    pub links: LinkDefaults,
    /// Relay connections
    pub relays: Vec<RelayEntry>,
}

/// Persistence settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// State file; in-memory when absent
    pub path: Option<PathBuf>,
}

/// Default colors applied when no override matches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Tag color
    pub tag: String,
    /// Text color
    pub text: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            tag: relay_routing::render::DEFAULT_TAG_COLOR.to_string(),
            text: relay_routing::render::DEFAULT_TEXT_COLOR.to_string(),
        }
    }
}

/// Link loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkDefaults {
    /// Upper bound for one transport write, e.g. `10s`
    pub write_timeout: String,
    /// Interval between chunk sweeps, e.g. `10s`
    pub sweep_interval: String,
    /// Envelopes buffered per link
    pub outbound_capacity: usize,
}

impl Default for LinkDefaults {
    fn default() -> Self {
        Self {
            write_timeout: "10s".to_string(),
            sweep_interval: "10s".to_string(),
            outbound_capacity: 256,
        }
    }
}

/// Room protocol of a relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolKind {
    /// Versioned Highway
    #[default]
    Highway,
    /// Pre-0.2 Highway
    LegacyHighway,
    /// Raw websocket, no room protocol
    Raw,
}

/// One relay connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEntry {
    /// Link name; the hub sees it as `relay(<name>)`
    pub name: String,
    /// Websocket URL
    pub url: String,
    /// Room protocol
    #[serde(default)]
    pub protocol: ProtocolKind,
    /// Rooms to subscribe to
    #[serde(default)]
    pub rooms: Vec<String>,
    /// Shared encryption password
    #[serde(default)]
    pub password: Option<String>,
    /// Split packets of at least this many bytes
    #[serde(default)]
    pub chunk_size: Option<usize>,
    /// Evict incomplete chunk sets after this long, e.g. `60s`
    #[serde(default)]
    pub chunk_timeout: Option<String>,
}

impl RelayEntry {
    /// Layer configuration for this relay
    pub fn stack_config(&self) -> Result<StackConfig> {
        let chunk = match self.chunk_size {
            Some(max_size) => {
                let timeout = match &self.chunk_timeout {
                    Some(raw) => parse_duration(raw)
                        .with_context(|| format!("relay {}: chunk_timeout", self.name))?,
                    None => DEFAULT_CHUNK_TIMEOUT,
                };
                Some(ChunkConfig { max_size, timeout })
            }
            None => None,
        };

        let rooms = self.rooms.clone();
        let protocol = match self.protocol {
            ProtocolKind::Highway => ProtocolConfig::Highway { rooms },
            ProtocolKind::LegacyHighway => ProtocolConfig::LegacyHighway { rooms },
            ProtocolKind::Raw => ProtocolConfig::None,
        };

        Ok(StackConfig {
            password: self.password.clone(),
            chunk,
            protocol,
        })
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    humantime::parse_duration(raw.trim()).with_context(|| format!("invalid duration {:?}", raw))
}

impl RelayConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => {
                let parsed: Self = serde_yaml::from_str(&content)
                    .with_context(|| format!("failed to parse config file {:?}", path))?;
                info!("Loaded configuration from {:?}", path);
                parsed
            }
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
        };

        config.apply_environment_overrides();
        config.validate()?;

        info!(
            "Final relay configuration: {} relay(s), storage={}",
            config.relays.len(),
            config
                .storage
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "memory".to_string())
        );
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("RELAY_STORAGE_PATH") {
            info!("Storage path overridden by environment: {}", path);
            self.storage.path = Some(PathBuf::from(path));
        }
        if let Some(tag) = lookup("RELAY_TAG_COLOR") {
            self.colors.tag = tag;
        }
        if let Some(text) = lookup("RELAY_TEXT_COLOR") {
            self.colors.text = text;
        }
        if let Some(timeout) = lookup("RELAY_WRITE_TIMEOUT") {
            self.links.write_timeout = timeout;
        }
        if let Some(interval) = lookup("RELAY_SWEEP_INTERVAL") {
            self.links.sweep_interval = interval;
        }
    }

    fn validate(&self) -> Result<()> {
        self.write_timeout()?;
        self.sweep_interval()?;
        let mut seen = std::collections::HashSet::new();
        for relay in &self.relays {
            if !seen.insert(relay.name.to_ascii_lowercase()) {
                bail!("duplicate relay name {:?}", relay.name);
            }
            relay.stack_config()?;
        }
        Ok(())
    }

    /// Storage backend selection
    pub fn storage_mode(&self) -> StorageMode {
        match &self.storage.path {
            Some(path) => StorageMode::File { path: path.clone() },
            None => StorageMode::InMemory,
        }
    }

    /// Per-link write timeout
    pub fn write_timeout(&self) -> Result<Duration> {
        parse_duration(&self.links.write_timeout)
    }

    /// Interval between chunk sweeps
    pub fn sweep_interval(&self) -> Result<Duration> {
        parse_duration(&self.links.sweep_interval)
    }

    /// Link loop settings
    pub fn link_config(&self) -> Result<RelayLinkConfig> {
        Ok(RelayLinkConfig {
            write_timeout: self.write_timeout()?,
            outbound_capacity: self.links.outbound_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert!(config.relays.is_empty());
        assert!(matches!(config.storage_mode(), StorageMode::InMemory));
        assert_eq!(config.colors.tag, "#C3C3C3");
        assert_eq!(config.write_timeout().unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r##"
storage:
  path: /tmp/relay-state.json
colors:
  tag: "#FF0000"
links:
  write_timeout: 5s
relays:
  - name: alliance
    url: ws://127.0.0.1:2501
    rooms: [alliance-chat]
    password: hunter2
    chunk_size: 900
  - name: oldfriends
    url: ws://127.0.0.1:2502
    protocol: legacy-highway
    rooms: [bots]
"##;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = RelayConfig::load_from_file(temp_file.path()).unwrap();
        assert!(matches!(config.storage_mode(), StorageMode::File { .. }));
        assert_eq!(config.colors.tag, "#FF0000");
        assert_eq!(config.colors.text, "#89D2E8");
        assert_eq!(config.link_config().unwrap().write_timeout, Duration::from_secs(5));
        assert_eq!(config.relays.len(), 2);

        let first = config.relays[0].stack_config().unwrap();
        assert_eq!(first.password.as_deref(), Some("hunter2"));
        assert_eq!(first.chunk.unwrap().max_size, 900);
        assert_eq!(first.chunk.unwrap().timeout, DEFAULT_CHUNK_TIMEOUT);
        assert_eq!(
            first.protocol,
            ProtocolConfig::Highway {
                rooms: vec!["alliance-chat".to_string()]
            }
        );
        assert!(matches!(
            config.relays[1].stack_config().unwrap().protocol,
            ProtocolConfig::LegacyHighway { .. }
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig::load_from_file(dir.path().join("absent.yaml")).unwrap();
        assert!(config.relays.is_empty());
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        let mut broken = NamedTempFile::new().unwrap();
        broken.write_all(b"relays: {not: [a list").unwrap();
        assert!(RelayConfig::load_from_file(broken.path()).is_err());

        let mut duplicate = NamedTempFile::new().unwrap();
        duplicate
            .write_all(b"relays:\n  - {name: a, url: ws://x}\n  - {name: A, url: ws://y}\n")
            .unwrap();
        assert!(RelayConfig::load_from_file(duplicate.path()).is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let mut config = RelayConfig::default();
        config.apply_overrides(|key| match key {
            "RELAY_STORAGE_PATH" => Some("/var/lib/relay.json".to_string()),
            "RELAY_SWEEP_INTERVAL" => Some("30s".to_string()),
            _ => None,
        });
        assert_eq!(config.storage.path, Some(PathBuf::from("/var/lib/relay.json")));
        assert_eq!(config.sweep_interval().unwrap(), Duration::from_secs(30));
        assert_eq!(config.colors.text, "#89D2E8");
    }
}
