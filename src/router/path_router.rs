//! Path Router
//!
//! Computes each patient's clinic order once and serves it unchanged
//! afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::clock::Clock;
use crate::error::{ClinicError, Result};
use crate::events::{self, EventPriority, EventSink, QueueEvent};
use crate::keys::{self, DateKey};
use crate::lock::DistributedLock;
use crate::queue::QueueLedger;
use crate::store::{self, Store};

use super::scoring::{self, Candidate};
use super::{Advance, ExamTemplate, PatientPath, ProgressEntry, TemplateCatalog};

/// Owns every [`PatientPath`]
pub struct PathRouter {
    store: Arc<dyn Store>,
    lock: DistributedLock,
    clock: Arc<dyn Clock>,
    ledger: Arc<QueueLedger>,
    sink: Arc<dyn EventSink>,
    templates: RwLock<TemplateCatalog>,
    utc_offset_secs: i32,
}

impl PathRouter {
    pub fn new(
        store: Arc<dyn Store>,
        lock: DistributedLock,
        clock: Arc<dyn Clock>,
        ledger: Arc<QueueLedger>,
        sink: Arc<dyn EventSink>,
        templates: TemplateCatalog,
        utc_offset_secs: i32,
    ) -> Self {
        Self {
            store,
            lock,
            clock,
            ledger,
            sink,
            templates: RwLock::new(templates),
            utc_offset_secs,
        }
    }

    /// Add or replace an exam type; existing paths are not recomputed
    pub fn register_template(&self, template: ExamTemplate) -> Result<()> {
        let exam_type = template.exam_type.clone();
        self.templates.write().insert(template)?;
        tracing::info!(exam_type = %exam_type, "exam template registered");
        Ok(())
    }

    pub fn template(&self, exam_type: &str) -> Option<ExamTemplate> {
        self.templates.read().get(exam_type).cloned()
    }

    /// Sticky path for a patient and exam type
    ///
    /// The first call computes and persists the path under the
    /// `(patient, examType)` lock; every later call returns the stored path
    /// even if clinic load has changed since.
    pub fn assign(&self, patient_id: &str, exam_type: &str) -> Result<PatientPath> {
        keys::validate_id("patientId", patient_id)?;
        keys::validate_id("examType", exam_type)?;
        let path_key = keys::path_key(patient_id, exam_type);

        if let Some(existing) = store::load::<PatientPath>(self.store.as_ref(), &path_key)? {
            return Ok(existing);
        }

        let guard = self.lock.lock(&path_key)?;

        // Lost the race: someone computed it while we waited.
        if let Some(existing) = store::load::<PatientPath>(self.store.as_ref(), &path_key)? {
            guard.release()?;
            tracing::debug!(patient_id, exam_type, "path assigned concurrently; reusing");
            return Ok(existing);
        }

        let template = self.template(exam_type).ok_or_else(|| {
            ClinicError::NotFound(format!("exam type {}", exam_type))
        })?;

        let path = self.compute(patient_id, &template)?;
        store::save(self.store.as_ref(), &path_key, &path, None)?;
        guard.release()?;

        tracing::info!(
            patient_id,
            exam_type,
            clinics = ?path.ordered_clinics,
            total_estimated_minutes = path.total_estimated_minutes,
            "path assigned"
        );
        Ok(path)
    }

    /// Stored path, if any
    pub fn get(&self, patient_id: &str, exam_type: &str) -> Result<Option<PatientPath>> {
        keys::validate_id("patientId", patient_id)?;
        keys::validate_id("examType", exam_type)?;
        store::load(self.store.as_ref(), &keys::path_key(patient_id, exam_type))
    }

    /// Record that the patient finished `completed_clinic_id` and move on
    pub fn advance(
        &self,
        patient_id: &str,
        exam_type: &str,
        completed_clinic_id: &str,
    ) -> Result<Advance> {
        keys::validate_id("patientId", patient_id)?;
        keys::validate_id("examType", exam_type)?;
        keys::validate_id("completedClinicId", completed_clinic_id)?;
        let path_key = keys::path_key(patient_id, exam_type);

        let guard = self.lock.lock(&path_key)?;
        let mut path: PatientPath = store::load(self.store.as_ref(), &path_key)?.ok_or_else(|| {
            ClinicError::NotFound(format!("path for {} / {}", patient_id, exam_type))
        })?;

        if path.is_complete() {
            return Err(ClinicError::InvalidState(format!(
                "journey for {} / {} is already complete",
                patient_id, exam_type
            )));
        }
        if path.has_completed(completed_clinic_id) {
            return Err(ClinicError::Conflict(format!(
                "{} already recorded {} as completed",
                patient_id, completed_clinic_id
            )));
        }
        if path.current_clinic() != Some(completed_clinic_id) {
            return Err(ClinicError::InvalidState(format!(
                "{} is at {:?}, not {}",
                patient_id,
                path.current_clinic(),
                completed_clinic_id
            )));
        }

        let now = self.clock.now_ms();
        let duration_seconds = now.saturating_sub(path.last_progress_at()) / 1000;
        path.progress_history.push(ProgressEntry {
            clinic_id: completed_clinic_id.to_string(),
            completed_at: now,
            duration_seconds,
        });
        path.current_step_index += 1;

        let next = path.current_clinic().map(str::to_string);
        let advance = match next {
            Some(next_clinic) => Advance::Next { next_clinic },
            None => {
                path.completed_at = Some(now);
                Advance::JourneyComplete
            }
        };

        store::save(self.store.as_ref(), &path_key, &path, None)?;
        guard.release()?;

        match &advance {
            Advance::Next { next_clinic } => {
                tracing::info!(patient_id, exam_type, completed = completed_clinic_id, next = %next_clinic, "path advanced");
                self.notify_next(patient_id, next_clinic);
            }
            Advance::JourneyComplete => {
                tracing::info!(patient_id, exam_type, steps = path.progress_history.len(), "journey complete");
            }
        }
        Ok(advance)
    }

    /// Administrative removal of a path
    pub fn reset(&self, patient_id: &str, exam_type: &str) -> Result<()> {
        keys::validate_id("patientId", patient_id)?;
        keys::validate_id("examType", exam_type)?;
        let path_key = keys::path_key(patient_id, exam_type);

        self.lock.with_lock(&path_key, || {
            self.store.delete(&path_key)?;
            tracing::warn!(audit = true, patient_id, exam_type, "path reset");
            Ok(())
        })
    }

    fn compute(&self, patient_id: &str, template: &ExamTemplate) -> Result<PatientPath> {
        let today = self.today()?;

        let mut candidates = Vec::with_capacity(template.candidates.len());
        for prior in &template.candidates {
            let queue_length = self.ledger.waiting_count(&prior.clinic_id, &today)? as u32;
            candidates.push(Candidate {
                clinic_id: prior.clinic_id.clone(),
                queue_length,
                priority_weight: prior.priority_weight,
                avg_service_time_minutes: prior.avg_service_time_minutes,
            });
        }

        let weights_snapshot: BTreeMap<String, u32> = candidates
            .iter()
            .map(|c| (c.clinic_id.clone(), c.queue_length))
            .collect();
        let scores: BTreeMap<String, f64> = candidates
            .iter()
            .map(|c| {
                let s = scoring::score(c.queue_length, c.priority_weight, c.avg_service_time_minutes);
                (c.clinic_id.clone(), s)
            })
            .collect();

        Ok(PatientPath {
            patient_id: patient_id.to_string(),
            exam_type: template.exam_type.clone(),
            ordered_clinics: scoring::order_clinics(&candidates),
            weights_snapshot,
            scores,
            total_estimated_minutes: scoring::total_estimated_minutes(&candidates),
            current_step_index: 0,
            progress_history: Vec::new(),
            sticky: true,
            created_at: self.clock.now_ms(),
            completed_at: None,
        })
    }

    fn notify_next(&self, patient_id: &str, next_clinic: &str) {
        let prospect = self.today().and_then(|today| {
            let ahead = self.ledger.waiting_count(next_clinic, &today)? as u32;
            let wait = self.ledger.estimated_wait_minutes(next_clinic, &today)?;
            Ok((ahead, wait))
        });

        match prospect {
            Ok((ahead, wait)) => events::dispatch(
                self.sink.as_ref(),
                vec![QueueEvent::queue_update(patient_id, next_clinic, ahead + 1, wait)
                    .with_priority(EventPriority::Low)],
            ),
            Err(e) => tracing::warn!(patient_id, next_clinic, error = %e, "could not estimate next clinic load"),
        }
    }

    fn today(&self) -> Result<DateKey> {
        DateKey::today(self.clock.as_ref(), self.utc_offset_secs)
    }
}
