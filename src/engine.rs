//! Engine Module
//!
//! The service facade that wires the store, the lock and the three
//! components together behind one interface.
//!
//! ## Responsibilities
//! - Pick and open the store backend
//! - Share one store, one clock and one lock primitive across components
//! - Route protocol requests to the owning component
//! - Cross-component operations (PIN-gated entry, clinic/day reset)

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{ClinicError, Result};
use crate::events::{EventSink, LogSink};
use crate::keys::DateKey;
use crate::lock::DistributedLock;
use crate::pin::{IssuedPin, PinAllocator};
use crate::protocol::{Reply, Request};
use crate::queue::{CalledTicket, Completion, EnterOutcome, QueueLedger, QueueSnapshot};
use crate::router::{Advance, PathRouter, PatientPath, TemplateCatalog};
use crate::store::{LogStore, MemoryStore, Store};

/// The queue, PIN and routing engine
///
/// ## Concurrency Model
///
/// Every method takes `&self`; share the engine across threads with `Arc`.
/// Mutations serialize per contention key through [`DistributedLock`]:
///
/// - PIN pool:  `pins:{clinic}:{date}`
/// - Queue:     `queue:{clinic}:{date}`
/// - Path:      `path:{patient}:{examType}`
///
/// Different clinics and different patients never wait on each other.
pub struct Engine {
    /// Engine configuration
    config: Config,

    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,

    pins: PinAllocator,
    ledger: Arc<QueueLedger>,
    router: PathRouter,
}

impl Engine {
    /// Open an engine with the system clock and a logging event sink
    ///
    /// With `data_dir` set the durable log store is opened (and replayed);
    /// otherwise state lives in memory.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store: Arc<dyn Store> = match &config.data_dir {
            Some(dir) => Arc::new(LogStore::open(
                dir,
                config.sync_strategy,
                config.compaction,
                Arc::clone(&clock),
            )?),
            None => Arc::new(MemoryStore::new(Arc::clone(&clock))),
        };

        Self::with_parts(config, store, clock, Arc::new(LogSink))
    }

    /// Assemble an engine from injected parts (tests, embedding)
    pub fn with_parts(
        config: Config,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;
        let lock = DistributedLock::new(Arc::clone(&store), Arc::clone(&clock), config.lock);
        let daily_ttl = config.daily_state_ttl();

        let pins = PinAllocator::new(Arc::clone(&store), lock.clone(), config.pins, daily_ttl);
        let ledger = Arc::new(QueueLedger::new(
            Arc::clone(&store),
            lock.clone(),
            Arc::clone(&clock),
            Arc::clone(&sink),
            daily_ttl,
            config.default_service_minutes,
        ));
        let router = PathRouter::new(
            Arc::clone(&store),
            lock,
            Arc::clone(&clock),
            Arc::clone(&ledger),
            sink,
            TemplateCatalog::builtin(),
            config.service_utc_offset_secs,
        );

        tracing::debug!(
            durable = config.data_dir.is_some(),
            utc_offset_secs = config.service_utc_offset_secs,
            "engine assembled"
        );

        Ok(Self {
            config,
            store,
            clock,
            pins,
            ledger,
            router,
        })
    }

    /// Execute a request
    ///
    /// Routes requests to the owning component
    pub fn execute(&self, request: Request) -> Result<Reply> {
        match request {
            Request::IssuePin {
                clinic_id,
                date_key,
                idempotency_key,
            } => self
                .issue_pin(&clinic_id, &date_key, idempotency_key.as_deref())
                .map(Reply::Pin),
            Request::ValidatePin {
                clinic_id,
                date_key,
                pin,
            } => self
                .validate_pin(&clinic_id, &date_key, &pin)
                .map(|valid| Reply::Validity { valid }),
            Request::Enter {
                clinic_id,
                date_key,
                visit_id,
                pin,
            } => self
                .enter(&clinic_id, &date_key, &visit_id, pin.as_deref())
                .map(Reply::Entered),
            Request::CallNext {
                clinic_id,
                date_key,
            } => self.call_next(&clinic_id, &date_key).map(Reply::Called),
            Request::Complete {
                clinic_id,
                date_key,
                ticket_number,
            } => self
                .complete(&clinic_id, &date_key, ticket_number)
                .map(Reply::Completed),
            Request::QueueStatus {
                clinic_id,
                date_key,
            } => self.queue_status(&clinic_id, &date_key).map(Reply::Status),
            Request::Position {
                clinic_id,
                date_key,
                visit_id,
            } => self
                .ledger
                .position(&clinic_id, &date_key, &visit_id)
                .map(|position| Reply::Position { position }),
            Request::AssignPath {
                patient_id,
                exam_type,
            } => self.assign_path(&patient_id, &exam_type).map(Reply::Path),
            Request::AdvancePath {
                patient_id,
                exam_type,
                completed_clinic_id,
            } => self
                .advance_path(&patient_id, &exam_type, &completed_clinic_id)
                .map(Reply::Advanced),
            Request::ResetClinicDay {
                clinic_id,
                date_key,
            } => self
                .reset_clinic_day(&clinic_id, &date_key)
                .map(|()| Reply::Reset),
            Request::Ping => Ok(Reply::Pong),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    pub fn issue_pin(
        &self,
        clinic_id: &str,
        date_key: &DateKey,
        idempotency_key: Option<&str>,
    ) -> Result<IssuedPin> {
        self.pins.issue(clinic_id, date_key, idempotency_key)
    }

    pub fn validate_pin(&self, clinic_id: &str, date_key: &DateKey, pin: &str) -> Result<bool> {
        self.pins.validate(clinic_id, date_key, pin)
    }

    /// Join a clinic's queue
    ///
    /// A presented PIN must have been issued today for this clinic. With
    /// `require_pin` set, entering without one is rejected.
    pub fn enter(
        &self,
        clinic_id: &str,
        date_key: &DateKey,
        visit_id: &str,
        pin: Option<&str>,
    ) -> Result<EnterOutcome> {
        match pin {
            Some(pin) => {
                if !self.pins.validate(clinic_id, date_key, pin)? {
                    return Err(ClinicError::NotFound(format!(
                        "pin {} was not issued for {} on {}",
                        pin, clinic_id, date_key
                    )));
                }
            }
            None if self.config.require_pin => {
                return Err(ClinicError::Validation("pin is required".to_string()));
            }
            None => {}
        }

        self.ledger.enter(clinic_id, date_key, visit_id)
    }

    pub fn call_next(&self, clinic_id: &str, date_key: &DateKey) -> Result<Option<CalledTicket>> {
        self.ledger.call_next(clinic_id, date_key)
    }

    pub fn complete(
        &self,
        clinic_id: &str,
        date_key: &DateKey,
        ticket_number: u64,
    ) -> Result<Completion> {
        self.ledger.complete(clinic_id, date_key, ticket_number)
    }

    pub fn queue_status(&self, clinic_id: &str, date_key: &DateKey) -> Result<QueueSnapshot> {
        self.ledger.status(clinic_id, date_key)
    }

    pub fn assign_path(&self, patient_id: &str, exam_type: &str) -> Result<PatientPath> {
        self.router.assign(patient_id, exam_type)
    }

    pub fn advance_path(
        &self,
        patient_id: &str,
        exam_type: &str,
        completed_clinic_id: &str,
    ) -> Result<Advance> {
        self.router.advance(patient_id, exam_type, completed_clinic_id)
    }

    /// Administrative: reinitialize the PIN pool and clear the queue
    ///
    /// Pool first, then queue. The two keys share no transaction, so a
    /// failure between the steps leaves a fresh pool next to the old queue;
    /// rerunning the reset converges.
    pub fn reset_clinic_day(&self, clinic_id: &str, date_key: &DateKey) -> Result<()> {
        self.pins.reset(clinic_id, date_key)?;
        self.ledger.reset(clinic_id, date_key)?;
        tracing::warn!(audit = true, clinic_id, %date_key, "clinic day reset");
        Ok(())
    }

    /// Today's date key in the service time zone
    pub fn today(&self) -> Result<DateKey> {
        DateKey::today(self.clock.as_ref(), self.config.service_utc_offset_secs)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn pins(&self) -> &PinAllocator {
        &self.pins
    }

    pub fn ledger(&self) -> &QueueLedger {
        &self.ledger
    }

    pub fn router(&self) -> &PathRouter {
        &self.router
    }
}
