//! Packet chunking for size-limited transports.
//!
//! Packets at or above the configured size are split into fragments that
//! share a correlation id. The receiving side collects fragments in any
//! order and emits the original packet once every part has arrived.
//! Incomplete sets are evicted by [`Chunker::sweep_at`] after a timeout.

use crate::error::WireError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Default maximum packet size before chunking kicks in
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1024;

/// Default age after which an incomplete fragment set is dropped
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(60);

/// One fragment of an oversized packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Correlation id shared by all fragments of one packet
    pub id: Uuid,
    /// 1-based fragment index
    pub part: u32,
    /// Total number of fragments
    pub count: u32,
    /// Sender timestamp (unix seconds)
    pub sent: u64,
    /// Fragment payload
    pub data: String,
}

/// Chunker configuration
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    /// Packets with at least this many bytes are split
    pub max_size: usize,
    /// Incomplete sets older than this are evicted
    pub timeout: Duration,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_CHUNK_SIZE,
            timeout: DEFAULT_CHUNK_TIMEOUT,
        }
    }
}

#[derive(Debug)]
struct Fragment {
    data: String,
    received_at: Instant,
}

#[derive(Debug)]
struct PendingSet {
    count: u32,
    parts: BTreeMap<u32, Fragment>,
}

impl PendingSet {
    fn oldest(&self) -> Option<Instant> {
        self.parts.values().map(|f| f.received_at).min()
    }
}

/// Splits outbound packets and reassembles inbound fragments
#[derive(Debug)]
pub struct Chunker {
    config: ChunkConfig,
    pending: HashMap<Uuid, PendingSet>,
}

impl Chunker {
    /// Create a new chunker
    pub fn new(config: ChunkConfig) -> Result<Self, WireError> {
        if config.max_size == 0 {
            return Err(WireError::ChunkConfig("max_size must be positive".to_string()));
        }
        Ok(Self {
            config,
            pending: HashMap::new(),
        })
    }

    /// Get the chunker configuration
    pub fn config(&self) -> ChunkConfig {
        self.config
    }

    /// Split a packet into wire fragments.
    ///
    /// Packets shorter than `max_size` pass through unchanged.
    pub fn split(&self, payload: &str) -> Result<Vec<String>, WireError> {
        if payload.len() < self.config.max_size {
            return Ok(vec![payload.to_string()]);
        }

        let pieces = split_on_char_boundaries(payload, self.config.max_size);
        let id = Uuid::new_v4();
        let count = pieces.len() as u32;
        let sent = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        debug!("Splitting {} bytes into {} chunks (id={})", payload.len(), count, id);

        pieces
            .into_iter()
            .enumerate()
            .map(|(idx, data)| {
                let chunk = Chunk {
                    id,
                    part: idx as u32 + 1,
                    count,
                    sent,
                    data: data.to_string(),
                };
                serde_json::to_string(&chunk).map_err(WireError::from)
            })
            .collect()
    }

    /// Accept one wire packet, returning a complete packet if one is ready
    pub fn receive(&mut self, packet: String) -> Option<String> {
        self.receive_at(packet, Instant::now())
    }

    /// Accept one wire packet with an explicit arrival time
    pub fn receive_at(&mut self, packet: String, now: Instant) -> Option<String> {
        let chunk: Chunk = match serde_json::from_str(&packet) {
            Ok(chunk) => chunk,
            // Not a fragment: unchunked packets pass straight through
            Err(_) => return Some(packet),
        };

        if chunk.count == 0 || chunk.part == 0 || chunk.part > chunk.count {
            warn!(
                "Dropping chunk {} with invalid part {}/{}",
                chunk.id, chunk.part, chunk.count
            );
            return None;
        }

        if chunk.count == 1 {
            return Some(chunk.data);
        }

        if chunk.data.is_empty() {
            warn!("Dropping empty chunk {} part {}/{}", chunk.id, chunk.part, chunk.count);
            return None;
        }

        let set = self.pending.entry(chunk.id).or_insert_with(|| PendingSet {
            count: chunk.count,
            parts: BTreeMap::new(),
        });

        if set.count != chunk.count {
            warn!(
                "Dropping chunk {} part {}: count {} does not match {}",
                chunk.id, chunk.part, chunk.count, set.count
            );
            return None;
        }

        set.parts.entry(chunk.part).or_insert(Fragment {
            data: chunk.data,
            received_at: now,
        });

        trace!(
            "Chunk {} has {}/{} parts",
            chunk.id,
            set.parts.len(),
            set.count
        );

        if set.parts.len() as u32 != set.count {
            return None;
        }

        let set = self.pending.remove(&chunk.id)?;
        let mut result = String::new();
        for fragment in set.parts.into_values() {
            result.push_str(&fragment.data);
        }
        debug!("Reassembled chunk {} ({} bytes)", chunk.id, result.len());
        Some(result)
    }

    /// Evict incomplete sets whose oldest fragment is older than the timeout.
    ///
    /// Returns the number of evicted sets.
    pub fn sweep_at(&mut self, now: Instant) -> usize {
        let timeout = self.config.timeout;
        let before = self.pending.len();
        self.pending.retain(|id, set| {
            let stale = set
                .oldest()
                .map(|oldest| now.saturating_duration_since(oldest) > timeout)
                .unwrap_or(true);
            if stale {
                debug!("Evicting incomplete chunk set {} ({}/{} parts)", id, set.parts.len(), set.count);
            }
            !stale
        });
        before - self.pending.len()
    }

    /// Check if any fragment set is waiting for more parts
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of incomplete fragment sets
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            config: ChunkConfig::default(),
            pending: HashMap::new(),
        }
    }
}

fn split_on_char_boundaries(payload: &str, max_size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < payload.len() {
        let mut end = (start + max_size).min(payload.len());
        while !payload.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // A single character wider than max_size still has to go out whole
            end = start + 1;
            while !payload.is_char_boundary(end) {
                end += 1;
            }
        }
        pieces.push(&payload[start..end]);
        start = end;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max_size: usize) -> Chunker {
        Chunker::new(ChunkConfig {
            max_size,
            timeout: Duration::from_secs(60),
        })
        .unwrap()
    }

    #[test]
    fn test_short_payload_passes_through() {
        let mut chunker = chunker(100);
        let parts = chunker.split("hello").unwrap();
        assert_eq!(parts, vec!["hello".to_string()]);

        let out = chunker.receive(parts[0].clone());
        assert_eq!(out.as_deref(), Some("hello"));
        assert!(!chunker.has_pending());
    }

    #[test]
    fn test_split_sizes() {
        let chunker = chunker(10);
        let payload = "a".repeat(25);
        let parts = chunker.split(&payload).unwrap();
        assert_eq!(parts.len(), 3);

        let chunks: Vec<Chunk> = parts
            .iter()
            .map(|p| serde_json::from_str(p).unwrap())
            .collect();
        assert!(chunks.iter().all(|c| c.id == chunks[0].id && c.count == 3));
        assert_eq!(chunks[0].data.len(), 10);
        assert_eq!(chunks[1].data.len(), 10);
        assert_eq!(chunks[2].data.len(), 5);
        assert_eq!(
            chunks.iter().map(|c| c.part).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_payload_at_limit_is_chunked() {
        let chunker = chunker(5);
        let parts = chunker.split("abcde").unwrap();
        let chunk: Chunk = serde_json::from_str(&parts[0]).unwrap();
        assert_eq!(chunk.count, 1);
        assert_eq!(chunk.data, "abcde");
    }

    #[test]
    fn test_reassembly_any_order() {
        let payload = "The quick brown fox jumps over the lazy dog";
        let orders: [[usize; 5]; 4] = [
            [0, 1, 2, 3, 4],
            [4, 3, 2, 1, 0],
            [2, 0, 4, 1, 3],
            [1, 4, 0, 3, 2],
        ];
        for order in orders {
            let mut chunker = chunker(9);
            let parts = chunker.split(payload).unwrap();
            assert_eq!(parts.len(), 5);

            let mut result = None;
            for (n, idx) in order.iter().enumerate() {
                let out = chunker.receive(parts[*idx].clone());
                if n < 4 {
                    assert!(out.is_none());
                } else {
                    result = out;
                }
            }
            assert_eq!(result.as_deref(), Some(payload));
            assert!(!chunker.has_pending());
        }
    }

    #[test]
    fn test_missing_fragment_stays_pending() {
        let mut chunker = chunker(4);
        let parts = chunker.split("0123456789ab").unwrap();
        assert_eq!(parts.len(), 3);

        assert!(chunker.receive(parts[0].clone()).is_none());
        assert!(chunker.receive(parts[2].clone()).is_none());
        assert!(chunker.has_pending());
        assert_eq!(chunker.pending_count(), 1);
    }

    #[test]
    fn test_duplicate_fragment_ignored() {
        let mut chunker = chunker(4);
        let parts = chunker.split("01234567").unwrap();
        assert!(chunker.receive(parts[0].clone()).is_none());
        assert!(chunker.receive(parts[0].clone()).is_none());
        assert_eq!(chunker.receive(parts[1].clone()).as_deref(), Some("01234567"));
    }

    #[test]
    fn test_mismatched_count_rejected() {
        let mut chunker = chunker(4);
        let id = Uuid::new_v4();
        let first = Chunk { id, part: 1, count: 2, sent: 0, data: "ab".into() };
        let bogus = Chunk { id, part: 2, count: 3, sent: 0, data: "cd".into() };
        assert!(chunker.receive(serde_json::to_string(&first).unwrap()).is_none());
        assert!(chunker.receive(serde_json::to_string(&bogus).unwrap()).is_none());
        assert!(chunker.has_pending());
    }

    #[test]
    fn test_eviction_after_timeout() {
        let mut chunker = chunker(4);
        let parts = chunker.split("0123456789ab").unwrap();
        let start = Instant::now();

        assert!(chunker.receive_at(parts[0].clone(), start).is_none());
        assert_eq!(chunker.sweep_at(start + Duration::from_secs(30)), 0);
        assert_eq!(chunker.sweep_at(start + Duration::from_secs(61)), 1);
        assert!(!chunker.has_pending());

        // Late fragments can no longer complete the evicted set
        let later = start + Duration::from_secs(62);
        assert!(chunker.receive_at(parts[1].clone(), later).is_none());
        assert!(chunker.receive_at(parts[2].clone(), later).is_none());
        assert!(chunker.has_pending());
    }

    #[test]
    fn test_multibyte_split() {
        let mut chunker = chunker(4);
        let payload = "héllo wörld ✓";
        let parts = chunker.split(payload).unwrap();
        assert!(parts.len() > 1);

        let mut out = None;
        for part in parts {
            out = chunker.receive(part);
        }
        assert_eq!(out.as_deref(), Some(payload));
    }

    #[test]
    fn test_zero_max_size_rejected() {
        let result = Chunker::new(ChunkConfig {
            max_size: 0,
            timeout: DEFAULT_CHUNK_TIMEOUT,
        });
        assert!(matches!(result, Err(WireError::ChunkConfig(_))));
    }
}
