//! Configuration for ClinicQ
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClinicError, Result};

/// Highest pool size that still fits the two-digit PIN format ("01".."99")
pub const MAX_POOL_SIZE: usize = 99;

/// Main configuration for a ClinicQ instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the durable store. `None` keeps all state in memory.
    /// Internal structure:
    ///   {data_dir}/
    ///     └── state.log        (append-only record log)
    pub data_dir: Option<PathBuf>,

    /// Sync strategy: how often to fsync the record log
    pub sync_strategy: SyncStrategy,

    /// When the record log is rewritten down to its live entries
    pub compaction: CompactionPolicy,

    /// TTL applied to per-day entities (pools, queues, idempotency cache is separate)
    pub daily_state_ttl_secs: u64,

    // -------------------------------------------------------------------------
    // Engine Configuration
    // -------------------------------------------------------------------------
    pub lock: LockConfig,

    pub pins: PinConfig,

    /// Fixed offset of the service time zone, used to compute today's date key
    pub service_utc_offset_secs: i32,

    /// Service time assumed for wait estimates before a clinic has history
    pub default_service_minutes: u32,

    /// Reject queue entries that do not present a valid PIN
    pub require_pin: bool,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

/// Record log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted records (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Automatic record log compaction thresholds
///
/// The log is compacted once it holds at least `min_records` records and
/// at least `dead_ratio` records per key held by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    pub min_records: u64,
    pub dead_ratio: u64,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            min_records: 4096,
            dead_ratio: 4,
        }
    }
}

/// Distributed lock timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// Server-side expiry of a held lock; bounds staleness after a holder crash
    pub ttl_ms: u64,

    /// How long `acquire` keeps retrying before `LockTimeout`
    pub timeout_ms: u64,

    /// Fixed sleep between attempts
    pub retry_interval_ms: u64,

    /// Upper bound of the random extra sleep added to each retry
    pub jitter_ms: u64,
}

impl LockConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 5_000,
            timeout_ms: 2_000,
            retry_interval_ms: 10,
            jitter_ms: 5,
        }
    }
}

/// PIN pool shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    /// Codes handed out first ("01".."20" by default)
    pub primary_size: usize,

    /// Codes handed out once the primary range is gone ("21".."30" by default)
    pub reserve_size: usize,

    /// How long an idempotent issuance response is replayed
    pub idempotency_ttl_secs: u64,
}

impl PinConfig {
    pub fn pool_size(&self) -> usize {
        self.primary_size + self.reserve_size
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            primary_size: 20,
            reserve_size: 10,
            idempotency_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            compaction: CompactionPolicy::default(),
            daily_state_ttl_secs: 2 * 24 * 60 * 60,
            lock: LockConfig::default(),
            pins: PinConfig::default(),
            service_utc_offset_secs: 0,
            default_service_minutes: 10,
            require_pin: false,
            listen_addr: "127.0.0.1:7411".to_string(),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check values that would otherwise fail deep inside an operation
    pub fn validate(&self) -> Result<()> {
        if self.pins.primary_size == 0 {
            return Err(ClinicError::Config(
                "pin primary_size must be at least 1".to_string(),
            ));
        }
        if self.pins.pool_size() > MAX_POOL_SIZE {
            return Err(ClinicError::Config(format!(
                "pin pool size {} exceeds two-digit limit {}",
                self.pins.pool_size(),
                MAX_POOL_SIZE
            )));
        }
        if self.lock.ttl_ms == 0 {
            return Err(ClinicError::Config("lock ttl_ms must be positive".to_string()));
        }
        if self.lock.retry_interval_ms == 0 {
            return Err(ClinicError::Config(
                "lock retry_interval_ms must be positive".to_string(),
            ));
        }
        if self.service_utc_offset_secs.abs() >= 24 * 60 * 60 {
            return Err(ClinicError::Config(format!(
                "service utc offset {}s is out of range",
                self.service_utc_offset_secs
            )));
        }
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(ClinicError::Config(
                "sync strategy count must be positive".to_string(),
            ));
        }
        if self.compaction.min_records == 0 {
            return Err(ClinicError::Config(
                "compaction min_records must be positive".to_string(),
            ));
        }
        if self.compaction.dead_ratio < 2 {
            return Err(ClinicError::Config(format!(
                "compaction dead_ratio {} must be at least 2",
                self.compaction.dead_ratio
            )));
        }
        Ok(())
    }

    pub fn daily_state_ttl(&self) -> Duration {
        Duration::from_secs(self.daily_state_ttl_secs)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (enables the durable store)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(path.into());
        self
    }

    /// Set the record log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the record log compaction thresholds
    pub fn compaction(mut self, policy: CompactionPolicy) -> Self {
        self.config.compaction = policy;
        self
    }

    pub fn daily_state_ttl_secs(mut self, secs: u64) -> Self {
        self.config.daily_state_ttl_secs = secs;
        self
    }

    /// Set all lock timings at once
    pub fn lock(mut self, lock: LockConfig) -> Self {
        self.config.lock = lock;
        self
    }

    /// Set the lock acquisition timeout (in milliseconds)
    pub fn lock_timeout_ms(mut self, ms: u64) -> Self {
        self.config.lock.timeout_ms = ms;
        self
    }

    /// Set the lock expiry (in milliseconds)
    pub fn lock_ttl_ms(mut self, ms: u64) -> Self {
        self.config.lock.ttl_ms = ms;
        self
    }

    /// Set the PIN pool split
    pub fn pin_pool(mut self, primary_size: usize, reserve_size: usize) -> Self {
        self.config.pins.primary_size = primary_size;
        self.config.pins.reserve_size = reserve_size;
        self
    }

    pub fn idempotency_ttl_secs(mut self, secs: u64) -> Self {
        self.config.pins.idempotency_ttl_secs = secs;
        self
    }

    /// Set the service time zone as a fixed UTC offset (in seconds)
    pub fn service_utc_offset_secs(mut self, secs: i32) -> Self {
        self.config.service_utc_offset_secs = secs;
        self
    }

    pub fn default_service_minutes(mut self, minutes: u32) -> Self {
        self.config.default_service_minutes = minutes;
        self
    }

    pub fn require_pin(mut self, required: bool) -> Self {
        self.config.require_pin = required;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
