//! Patient paths

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One finished step of a journey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub clinic_id: String,

    /// Unix millis
    pub completed_at: u64,

    /// Time since the previous step finished (or since the path was created)
    pub duration_seconds: u64,
}

/// Sticky ordered list of clinics for one patient and exam type
///
/// `ordered_clinics`, `weights_snapshot` and `scores` never change after the
/// path is first persisted; only the progress fields move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientPath {
    pub patient_id: String,
    pub exam_type: String,
    pub ordered_clinics: Vec<String>,

    /// Queue length per clinic when the path was computed
    pub weights_snapshot: BTreeMap<String, u32>,
    pub scores: BTreeMap<String, f64>,
    pub total_estimated_minutes: u32,
    pub current_step_index: usize,
    pub progress_history: Vec<ProgressEntry>,
    pub sticky: bool,

    /// Unix millis
    pub created_at: u64,
    pub completed_at: Option<u64>,
}

impl PatientPath {
    /// Clinic the patient should be at now, `None` once finished
    pub fn current_clinic(&self) -> Option<&str> {
        self.ordered_clinics
            .get(self.current_step_index)
            .map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn has_completed(&self, clinic_id: &str) -> bool {
        self.progress_history.iter().any(|p| p.clinic_id == clinic_id)
    }

    /// Unix millis of the last completed step, or creation time
    pub fn last_progress_at(&self) -> u64 {
        self.progress_history
            .last()
            .map(|p| p.completed_at)
            .unwrap_or(self.created_at)
    }
}

/// Result of advancing along a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Advance {
    /// Go here next
    #[serde(rename_all = "camelCase")]
    Next { next_clinic: String },

    /// Every clinic has been visited
    JourneyComplete,
}
