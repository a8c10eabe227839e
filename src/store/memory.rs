//! In-memory store
//!
//! BTreeMap-based store with RwLock for concurrency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::Result;

use super::Store;

/// A value with its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: Vec<u8>,

    /// Unix millis after which the entry reads as absent
    pub expires_at_ms: Option<u64>,
}

impl StoredValue {
    fn is_live(&self, now_ms: u64) -> bool {
        match self.expires_at_ms {
            Some(deadline) => now_ms < deadline,
            None => true,
        }
    }
}

/// In-memory keyed store
///
/// ## Concurrency:
/// - `data`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `put_if_absent` checks and inserts under one write lock, so it is atomic
///   with respect to every other call on this store
///
/// Readers filter expired entries by the clock. Every `SWEEP_INTERVAL`
/// writes, the writer also drops every expired entry while it holds the
/// write lock, so dead keys never outnumber one sweep interval of writes.
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, StoredValue>>,
    writes: AtomicU64,
    clock: Arc<dyn Clock>,
}

/// Writes between two sweeps of expired entries
pub const SWEEP_INTERVAL: u64 = 256;

impl MemoryStore {
    /// Create a new empty store reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            writes: AtomicU64::new(0),
            clock,
        }
    }

    /// Insert with an absolute deadline (used by log replay)
    pub fn put_with_deadline(&self, key: String, value: Vec<u8>, expires_at_ms: Option<u64>) {
        let mut data = self.data.write();
        data.insert(
            key,
            StoredValue {
                value,
                expires_at_ms,
            },
        );
        self.maybe_sweep(&mut data);
    }

    fn maybe_sweep(&self, data: &mut BTreeMap<String, StoredValue>) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_INTERVAL == 0 {
            let now = self.clock.now_ms();
            data.retain(|_, v| v.is_live(now));
        }
    }

    /// Remove a key without going through the trait
    pub fn remove(&self, key: &str) {
        self.data.write().remove(key);
    }

    /// Compute the absolute deadline of a relative TTL
    pub fn deadline(&self, ttl: Option<Duration>) -> Option<u64> {
        ttl.map(|t| self.clock.now_ms().saturating_add(t.as_millis() as u64))
    }

    /// Whether a live value exists under `key`
    pub fn contains_live(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.data
            .read()
            .get(key)
            .map(|v| v.is_live(now))
            .unwrap_or(false)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = self.clock.now_ms();
        self.data.read().values().filter(|v| v.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries held in memory, expired ones included
    pub fn stored_entries(&self) -> usize {
        self.data.read().len()
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, v| v.is_live(now));
        before - data.len()
    }

    /// Live entries in key order (used by log compaction)
    pub fn snapshot(&self) -> Vec<(String, StoredValue)> {
        let now = self.clock.now_ms();
        self.data
            .read()
            .iter()
            .filter(|(_, v)| v.is_live(now))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now_ms();
        Ok(self
            .data
            .read()
            .get(key)
            .filter(|v| v.is_live(now))
            .map(|v| v.value.clone()))
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let expires_at_ms = self.deadline(ttl);
        self.put_with_deadline(key.to_string(), value.to_vec(), expires_at_ms);
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool> {
        let now = self.clock.now_ms();
        let mut data = self.data.write();

        if data.get(key).map(|v| v.is_live(now)).unwrap_or(false) {
            return Ok(false);
        }

        data.insert(
            key.to_string(),
            StoredValue {
                value: value.to_vec(),
                expires_at_ms: ttl.map(|t| now.saturating_add(t.as_millis() as u64)),
            },
        );
        self.maybe_sweep(&mut data);
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.remove(key);
        Ok(())
    }
}
