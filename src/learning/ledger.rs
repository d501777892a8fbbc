//! Hashes of observations the learning manager has already consumed, so
//! replaying the same log twice does not count any change twice.

use crate::errors::FixError;
use crate::storage::{FileStorage, MemoryStorage, StoragePort};
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Only the newest hashes are kept.
pub const LEDGER_CAPACITY: usize = 10_000;

/// Stable identity of one `(layer, before, after)` observation.
pub fn observation_hash(layer_id: u8, before: &str, after: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update([layer_id]);
    hasher.update((before.len() as u64).to_le_bytes());
    hasher.update(before.as_bytes());
    hasher.update(after.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stable identity of a security finding.
pub fn finding_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"finding");
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub struct ReplayLedger {
    storage: Box<dyn StoragePort>,
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
    loaded: bool,
    dirty: bool,
}

impl ReplayLedger {
    pub fn new(storage: impl StoragePort + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            order: VecDeque::new(),
            seen: HashSet::new(),
            capacity: LEDGER_CAPACITY,
            loaded: false,
            dirty: false,
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(FileStorage::new(path))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        let content = match self.storage.read() {
            Ok(Some(content)) => content,
            Ok(None) => return,
            Err(e) => {
                warn!("Could not read replay ledger {}: {}", self.storage.describe(), e);
                return;
            }
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(hashes) => {
                for hash in hashes {
                    self.insert(hash);
                }
                debug!("Loaded {} replay hashes", self.order.len());
            }
            Err(e) => warn!(
                "Replay ledger {} is corrupt, starting empty: {}",
                self.storage.describe(),
                e
            ),
        }
    }

    fn insert(&mut self, hash: String) -> bool {
        if !self.seen.insert(hash.clone()) {
            return false;
        }
        self.order.push_back(hash);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    pub fn contains(&mut self, hash: &str) -> bool {
        self.ensure_loaded();
        self.seen.contains(hash)
    }

    /// Record a hash. Returns `false` if it was already present.
    pub fn record(&mut self, hash: String) -> bool {
        self.ensure_loaded();
        let inserted = self.insert(hash);
        self.dirty |= inserted;
        inserted
    }

    pub fn len(&mut self) -> usize {
        self.ensure_loaded();
        self.order.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Persist if anything was recorded since the last save.
    pub fn save(&mut self) -> Result<(), FixError> {
        if !self.dirty {
            return Ok(());
        }
        let hashes: Vec<&String> = self.order.iter().collect();
        self.storage.write(&serde_json::to_string(&hashes)?)?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_distinguishes_fields() {
        let a = observation_hash(2, "ab", "c");
        assert_eq!(a, observation_hash(2, "ab", "c"));
        assert_ne!(a, observation_hash(3, "ab", "c"));
        assert_ne!(a, observation_hash(2, "a", "bc"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_record_and_contains() {
        let mut ledger = ReplayLedger::in_memory();
        let hash = observation_hash(2, "x", "y");
        assert!(!ledger.contains(&hash));
        assert!(ledger.record(hash.clone()));
        assert!(!ledger.record(hash.clone()));
        assert!(ledger.contains(&hash));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut ledger = ReplayLedger::in_memory().with_capacity(2);
        ledger.record("a".to_string());
        ledger.record("b".to_string());
        ledger.record("c".to_string());
        assert_eq!(ledger.len(), 2);
        assert!(!ledger.contains("a"));
        assert!(ledger.contains("c"));
    }

    #[test]
    fn test_persists_through_storage() {
        let storage = MemoryStorage::new();
        let mut ledger = ReplayLedger::new(storage.clone());
        ledger.record("h1".to_string());
        ledger.save().unwrap();

        let mut reopened = ReplayLedger::new(storage);
        assert!(reopened.contains("h1"));
    }

    #[test]
    fn test_corrupt_ledger_starts_empty() {
        let mut ledger = ReplayLedger::new(MemoryStorage::with_contents("{not json"));
        assert!(ledger.is_empty());
        assert!(ledger.record("h".to_string()));
    }
}
