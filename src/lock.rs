//! Distributed Lock
//!
//! Mutual exclusion built on the store's create-if-absent write.
//!
//! ## Protocol
//! - **acquire**: write a fresh token under `lock:{key}` only if absent, with
//!   a short expiry. On contention sleep `retry_interval + jitter` and retry
//!   until the timeout elapses.
//! - **release**: read the current token and delete it only if it is ours.
//!   A holder whose lock expired and was taken over cannot release the new
//!   holder's lock.
//!
//! The expiry bounds how long a crashed holder can block a key. It is not a
//! lease: a holder that outlives its TTL loses exclusivity silently, so the
//! TTL must stay well above the longest critical section.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::LockConfig;
use crate::error::{ClinicError, Result};
use crate::keys;
use crate::store::Store;

/// Opaque proof of ownership of a lock
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Store-backed mutex keyed by contention key
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: LockConfig,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: LockConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Single attempt; `None` if someone else holds the lock
    pub fn try_acquire(&self, key: &str) -> Result<Option<LockToken>> {
        let token = LockToken::generate();
        let created = self.store.put_if_absent(
            &keys::lock_key(key),
            token.as_str().as_bytes(),
            Some(self.config.ttl()),
        )?;
        Ok(created.then_some(token))
    }

    /// Acquire `key`, retrying until `timeout` elapses
    pub fn acquire(&self, key: &str, timeout: Duration) -> Result<LockToken> {
        let started = self.clock.now_ms();
        let deadline = started.saturating_add(timeout.as_millis() as u64);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if let Some(token) = self.try_acquire(key)? {
                tracing::debug!(key, attempts, "lock acquired");
                return Ok(token);
            }

            let now = self.clock.now_ms();
            if now >= deadline {
                let waited_ms = now.saturating_sub(started);
                tracing::debug!(key, attempts, waited_ms, "lock acquisition timed out");
                return Err(ClinicError::LockTimeout {
                    key: key.to_string(),
                    waited_ms,
                });
            }

            let sleep_ms = self
                .backoff_ms()
                .min(deadline.saturating_sub(now))
                .max(1);
            self.clock.sleep(Duration::from_millis(sleep_ms));
        }
    }

    /// Release `key` if `token` still owns it
    ///
    /// Returns whether the lock was ours to release.
    pub fn release(&self, key: &str, token: &LockToken) -> Result<bool> {
        let lock_key = keys::lock_key(key);
        match self.store.get(&lock_key)? {
            Some(current) if current == token.as_str().as_bytes() => {
                self.store.delete(&lock_key)?;
                tracing::debug!(key, "lock released");
                Ok(true)
            }
            Some(_) => {
                tracing::warn!(key, "lock taken over by another holder before release");
                Ok(false)
            }
            None => {
                tracing::warn!(key, "lock expired before release");
                Ok(false)
            }
        }
    }

    /// Acquire with the configured timeout and return a guard
    pub fn lock(&self, key: &str) -> Result<LockGuard<'_>> {
        let token = self.acquire(key, self.config.timeout())?;
        Ok(LockGuard {
            lock: self,
            key: key.to_string(),
            token: Some(token),
        })
    }

    /// Run `f` while holding `key`
    ///
    /// An error from `f` wins over a failure to release; the release error
    /// is only returned when `f` succeeded.
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let guard = self.lock(key)?;
        let outcome = f();
        match (outcome, guard.release()) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(release_err)) => Err(release_err),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(release_err)) => {
                tracing::error!(key, error = %release_err, "failed to release lock after error");
                Err(e)
            }
        }
    }

    fn backoff_ms(&self) -> u64 {
        let jitter = if self.config.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        self.config.retry_interval_ms.saturating_add(jitter)
    }
}

/// Holds a lock until released or dropped
///
/// Dropping the guard releases the lock, which covers early returns via `?`
/// and panics inside the critical section.
pub struct LockGuard<'a> {
    lock: &'a DistributedLock,
    key: String,
    token: Option<LockToken>,
}

impl LockGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> Option<&LockToken> {
        self.token.as_ref()
    }

    /// Release explicitly, surfacing store errors
    pub fn release(mut self) -> Result<bool> {
        match self.token.take() {
            Some(token) => self.lock.release(&self.key, &token),
            None => Ok(false),
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(e) = self.lock.release(&self.key, &token) {
                tracing::error!(key = %self.key, error = %e, "failed to release lock on drop");
            }
        }
    }
}
