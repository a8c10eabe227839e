//! Store Module
//!
//! The only persistence substrate: a keyed, TTL-capable get/put/delete
//! primitive over byte-string values.
//!
//! ## Responsibilities
//! - Point reads and writes of opaque values
//! - Server-side expiry (expired entries read as absent)
//! - A conditional create-if-absent write, the building block of the lock
//!
//! ## Non-responsibilities
//! The store offers no multi-key transactions and no compare-and-swap on
//! existing values. Multi-step mutations are serialized by
//! [`crate::lock::DistributedLock`].
//!
//! ## Backends
//! - [`MemoryStore`]: in-process map, used by tests and as the index of the
//!   durable backend
//! - [`LogStore`]: append-only record log replayed into a `MemoryStore`

mod memory;
pub mod log;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub use memory::{MemoryStore, StoredValue, SWEEP_INTERVAL};
pub use log::LogStore;

/// Keyed byte-string store with per-entry expiry
pub trait Store: Send + Sync {
    /// Read a live value
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Unconditional write; `ttl` of `None` never expires
    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Write only if no live value exists. Returns whether the write happened.
    fn put_if_absent(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool>;

    /// Remove a key (no error if absent)
    fn delete(&self, key: &str) -> Result<()>;
}

/// Read and decode a bincode-encoded entity
pub fn load<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write an entity with bincode
pub fn save<T: Serialize>(
    store: &dyn Store,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<()> {
    let bytes = bincode::serialize(value)?;
    store.put(key, &bytes, ttl)
}
