//! Log Writer
//!
//! Handles appending records to the state log file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::Result;

use super::{LogOp, LogRecord};

/// Appends records to the log file
pub struct LogWriter {
    path: PathBuf,
    file: BufWriter<File>,
    next_lsn: u64,
    sync_strategy: SyncStrategy,

    /// Records written since the last fsync
    unsynced: usize,
}

impl LogWriter {
    /// Open or create a log file, continuing after `last_lsn`
    pub fn open(path: &Path, sync_strategy: SyncStrategy, last_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
            next_lsn: last_lsn + 1,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append a mutation, returning its LSN
    pub fn append(&mut self, op: LogOp, timestamp_ms: u64) -> Result<u64> {
        let lsn = self.next_lsn;
        let bytes = LogRecord::new(lsn, op, timestamp_ms).serialize()?;
        self.file.write_all(&bytes)?;
        self.next_lsn += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        } else {
            self.file.flush()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// LSN of the most recently appended record (0 if none)
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn - 1
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
