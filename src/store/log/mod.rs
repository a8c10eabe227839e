//! Durable store backed by an append-only record log.
//!
//! Every mutation is appended to the log before it is applied to an
//! in-memory [`MemoryStore`] index; reads are served from the index. On
//! open the log is replayed and a torn or corrupted tail is cut off.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```

mod record;
mod writer;
mod recovery;

pub use record::{LogOp, LogRecord, HEADER_SIZE, MAX_RECORD_SIZE};
pub use writer::LogWriter;
pub use recovery::{LogRecovery, RecoveryResult};

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::config::{CompactionPolicy, SyncStrategy};
use crate::error::Result;

use super::{MemoryStore, Store};

/// Durable [`Store`] implementation
///
/// ## Concurrency:
/// - Reads go straight to the index (RwLock, concurrent)
/// - Writes hold `writer` for append + apply, so the log order matches the
///   index order and `put_if_absent` stays atomic
/// - Automatic compaction runs under the same `writer` lock after an append
pub struct LogStore {
    index: MemoryStore,
    writer: Mutex<LogWriter>,
    clock: Arc<dyn Clock>,
    sync_strategy: SyncStrategy,
    compaction: CompactionPolicy,
    recovery: RecoveryResult,
}

impl LogStore {
    const LOG_FILENAME: &'static str = "state.log";

    /// Open or create the store in `dir`, replaying any existing log
    pub fn open(
        dir: &Path,
        sync_strategy: SyncStrategy,
        compaction: CompactionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::LOG_FILENAME);
        let index = MemoryStore::new(Arc::clone(&clock));

        let recovery = if path.exists() {
            let (records, result) = LogRecovery::recover(&path)?;
            for record in records {
                Self::apply(&index, record.op);
            }
            // Expired entries were replayed too; drop them now.
            index.purge_expired();

            if result.records_recovered > 0 || result.records_corrupted > 0 {
                tracing::info!(
                    recovered = result.records_recovered,
                    corrupted = result.records_corrupted,
                    last_lsn = result.last_lsn,
                    truncated = result.was_truncated,
                    "state log replayed"
                );
            }
            result
        } else {
            RecoveryResult::default()
        };

        let writer = LogWriter::open(&path, sync_strategy, recovery.last_lsn)?;

        let store = Self {
            index,
            writer: Mutex::new(writer),
            clock,
            sync_strategy,
            compaction,
            recovery,
        };
        store.maybe_compact(&mut store.writer.lock());
        Ok(store)
    }

    /// Outcome of the replay performed by `open`
    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// Path of the underlying log file
    pub fn log_path(&self) -> PathBuf {
        self.writer.lock().path().to_path_buf()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Force sync to disk
    pub fn sync(&self) -> Result<()> {
        self.writer.lock().sync()
    }

    /// Rewrite the log with only live entries
    ///
    /// Writes a fresh file next to the log and renames it over the old one,
    /// so a crash mid-compaction leaves the previous log intact.
    pub fn compact(&self) -> Result<usize> {
        self.compact_locked(&mut self.writer.lock())
    }

    fn compact_locked(&self, writer: &mut LogWriter) -> Result<usize> {
        writer.sync()?;

        let path = writer.path().to_path_buf();
        let tmp_path = path.with_extension("log.compact");
        let live = self.index.snapshot();
        let now = self.clock.now_ms();

        {
            let mut out = BufWriter::new(File::create(&tmp_path)?);
            for (lsn, (key, stored)) in live.iter().enumerate() {
                let op = LogOp::Put {
                    key: key.clone(),
                    value: stored.value.clone(),
                    expires_at_ms: stored.expires_at_ms,
                };
                out.write_all(&LogRecord::new(lsn as u64 + 1, op, now).serialize()?)?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, &path)?;
        *writer = LogWriter::open(&path, self.sync_strategy, live.len() as u64)?;

        tracing::info!(live_keys = live.len(), "state log compacted");
        Ok(live.len())
    }

    /// Compact once the log is mostly superseded records
    ///
    /// A failed compaction leaves the current log in place; the write that
    /// triggered it has already been appended and stands.
    fn maybe_compact(&self, writer: &mut LogWriter) {
        let records = writer.current_lsn();
        let held = (self.index.stored_entries() as u64).max(1);
        if records < self.compaction.min_records
            || records < held.saturating_mul(self.compaction.dead_ratio)
        {
            return;
        }

        if let Err(e) = self.compact_locked(writer) {
            tracing::warn!(error = %e, records, "automatic log compaction failed");
        }
    }

    fn apply(index: &MemoryStore, op: LogOp) {
        match op {
            LogOp::Put {
                key,
                value,
                expires_at_ms,
            } => index.put_with_deadline(key, value, expires_at_ms),
            LogOp::Delete { key } => index.remove(&key),
        }
    }
}

impl Store for LogStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.index.get(key)
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut writer = self.writer.lock();
        let op = LogOp::Put {
            key: key.to_string(),
            value: value.to_vec(),
            expires_at_ms: self.index.deadline(ttl),
        };
        writer.append(op.clone(), self.clock.now_ms())?;
        Self::apply(&self.index, op);
        self.maybe_compact(&mut writer);
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool> {
        let mut writer = self.writer.lock();
        if self.index.contains_live(key) {
            return Ok(false);
        }

        let op = LogOp::Put {
            key: key.to_string(),
            value: value.to_vec(),
            expires_at_ms: self.index.deadline(ttl),
        };
        writer.append(op.clone(), self.clock.now_ms())?;
        Self::apply(&self.index, op);
        self.maybe_compact(&mut writer);
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        if !self.index.contains_live(key) {
            // Still drop any expired leftover from the index.
            self.index.remove(key);
            return Ok(());
        }

        let op = LogOp::Delete {
            key: key.to_string(),
        };
        writer.append(op.clone(), self.clock.now_ms())?;
        Self::apply(&self.index, op);
        self.maybe_compact(&mut writer);
        Ok(())
    }
}
