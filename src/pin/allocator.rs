//! PIN Allocator
//!
//! Issues, validates and resets daily access codes.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PinConfig;
use crate::error::{ClinicError, Result};
use crate::keys::{self, DateKey};
use crate::lock::DistributedLock;
use crate::store::{self, Store};

use super::DailyPinPool;

/// Response of a successful issuance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedPin {
    pub pin: String,

    /// Whether the pool has started drawing from the reserve range
    pub reserve_mode: bool,
}

/// Owns every [`DailyPinPool`]
pub struct PinAllocator {
    store: Arc<dyn Store>,
    lock: DistributedLock,
    config: PinConfig,
    daily_ttl: Duration,
}

impl PinAllocator {
    pub fn new(
        store: Arc<dyn Store>,
        lock: DistributedLock,
        config: PinConfig,
        daily_ttl: Duration,
    ) -> Self {
        Self {
            store,
            lock,
            config,
            daily_ttl,
        }
    }

    /// Issue the next code for a clinic/day
    ///
    /// With an idempotency key, a retried request replays the first
    /// response instead of consuming another code.
    pub fn issue(
        &self,
        clinic_id: &str,
        date_key: &DateKey,
        idempotency_key: Option<&str>,
    ) -> Result<IssuedPin> {
        keys::validate_id("clinicId", clinic_id)?;
        let cache_key = match idempotency_key {
            Some(k) => {
                keys::validate_id("idempotencyKey", k)?;
                Some(keys::pin_idempotency_key(clinic_id, date_key, k))
            }
            None => None,
        };

        // Fast path: replay without touching the lock.
        if let Some(cache_key) = &cache_key {
            if let Some(cached) = store::load::<IssuedPin>(self.store.as_ref(), cache_key)? {
                tracing::debug!(clinic_id, %date_key, "replaying idempotent pin issuance");
                return Ok(cached);
            }
        }

        let pool_key = keys::pins_key(clinic_id, date_key);
        let guard = self.lock.lock(&pool_key)?;

        // A concurrent retry may have finished while we waited for the lock.
        if let Some(cache_key) = &cache_key {
            if let Some(cached) = store::load::<IssuedPin>(self.store.as_ref(), cache_key)? {
                guard.release()?;
                return Ok(cached);
            }
        }

        let mut pool = self.load_or_init(&pool_key)?;
        let pin = pool.take_next().ok_or_else(|| {
            tracing::warn!(clinic_id, %date_key, issued = pool.issued, "pin pool exhausted");
            ClinicError::ResourceExhausted(format!(
                "pin pool for {} on {} is exhausted",
                clinic_id, date_key
            ))
        })?;

        let issued = IssuedPin {
            pin,
            reserve_mode: pool.reserve_mode,
        };

        // The pool write commits the issuance and must come last.
        if let Some(cache_key) = &cache_key {
            let ttl = Duration::from_secs(self.config.idempotency_ttl_secs);
            store::save(self.store.as_ref(), cache_key, &issued, Some(ttl))?;
        }
        if let Err(e) = store::save(self.store.as_ref(), &pool_key, &pool, Some(self.daily_ttl)) {
            if let Some(cache_key) = &cache_key {
                if let Err(undo) = self.store.delete(cache_key) {
                    tracing::error!(
                        clinic_id,
                        %date_key,
                        error = %undo,
                        "failed to drop idempotency entry of an uncommitted pin"
                    );
                }
            }
            return Err(e);
        }

        guard.release()?;

        tracing::info!(
            clinic_id,
            %date_key,
            pin = %issued.pin,
            reserve_mode = issued.reserve_mode,
            remaining = pool.remaining(),
            "pin issued"
        );
        Ok(issued)
    }

    /// Whether `pin` has been issued today for this clinic
    pub fn validate(&self, clinic_id: &str, date_key: &DateKey, pin: &str) -> Result<bool> {
        keys::validate_id("clinicId", clinic_id)?;
        if pin.is_empty() {
            return Err(ClinicError::Validation("pin is required".to_string()));
        }

        let pool: Option<DailyPinPool> =
            store::load(self.store.as_ref(), &keys::pins_key(clinic_id, date_key))?;
        Ok(pool.map(|p| p.is_taken(pin)).unwrap_or(false))
    }

    /// Reinitialize the pool to the default split
    pub fn reset(&self, clinic_id: &str, date_key: &DateKey) -> Result<()> {
        keys::validate_id("clinicId", clinic_id)?;
        let pool_key = keys::pins_key(clinic_id, date_key);

        self.lock.with_lock(&pool_key, || {
            let previous: Option<DailyPinPool> = store::load(self.store.as_ref(), &pool_key)?;
            let pool = DailyPinPool::new(&self.config);
            store::save(self.store.as_ref(), &pool_key, &pool, Some(self.daily_ttl))?;

            tracing::warn!(
                audit = true,
                clinic_id,
                %date_key,
                previously_issued = previous.map(|p| p.issued).unwrap_or(0),
                "pin pool reset"
            );
            Ok(())
        })
    }

    /// Current pool, if one has been created
    pub fn pool(&self, clinic_id: &str, date_key: &DateKey) -> Result<Option<DailyPinPool>> {
        keys::validate_id("clinicId", clinic_id)?;
        store::load(self.store.as_ref(), &keys::pins_key(clinic_id, date_key))
    }

    fn load_or_init(&self, pool_key: &str) -> Result<DailyPinPool> {
        match store::load::<DailyPinPool>(self.store.as_ref(), pool_key)? {
            Some(pool) if pool.is_conserved() => Ok(pool),
            Some(pool) => Err(ClinicError::Corruption(format!(
                "pin pool {} violates conservation: {} + {} + {} != {}",
                pool_key,
                pool.available.len(),
                pool.reserve.len(),
                pool.taken.len(),
                pool.pool_size
            ))),
            None => Ok(DailyPinPool::new(&self.config)),
        }
    }
}
