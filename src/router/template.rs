//! Exam templates
//!
//! An exam type names the clinics a patient must visit, each with a
//! routing prior.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ClinicError, Result};
use crate::keys;

/// Routing prior of one candidate clinic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicPrior {
    pub clinic_id: String,

    /// Multiplier biasing the score independent of load
    pub priority_weight: f64,
    pub avg_service_time_minutes: u32,
}

impl ClinicPrior {
    pub fn new(clinic_id: &str, priority_weight: f64, avg_service_time_minutes: u32) -> Self {
        Self {
            clinic_id: clinic_id.to_string(),
            priority_weight,
            avg_service_time_minutes,
        }
    }
}

/// Candidate clinics of one exam type, in tie-break order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamTemplate {
    pub exam_type: String,
    pub candidates: Vec<ClinicPrior>,
}

impl ExamTemplate {
    pub fn new(exam_type: &str, candidates: Vec<ClinicPrior>) -> Self {
        Self {
            exam_type: exam_type.to_string(),
            candidates,
        }
    }

    /// Reject templates that could not produce a sane path
    pub fn validate(&self) -> Result<()> {
        keys::validate_id("examType", &self.exam_type)?;
        if self.candidates.is_empty() {
            return Err(ClinicError::Validation(format!(
                "exam type {} has no candidate clinics",
                self.exam_type
            )));
        }
        for (i, prior) in self.candidates.iter().enumerate() {
            keys::validate_id("clinicId", &prior.clinic_id)?;
            if !prior.priority_weight.is_finite() || prior.priority_weight < 0.0 {
                return Err(ClinicError::Validation(format!(
                    "clinic {} has invalid priority weight {}",
                    prior.clinic_id, prior.priority_weight
                )));
            }
            if self.candidates[..i].iter().any(|p| p.clinic_id == prior.clinic_id) {
                return Err(ClinicError::Validation(format!(
                    "clinic {} listed twice in exam type {}",
                    prior.clinic_id, self.exam_type
                )));
            }
        }
        Ok(())
    }
}

/// Exam types known to the router
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, ExamTemplate>,
}

impl TemplateCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with the center's standard exam types
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        let templates = [
            ExamTemplate::new(
                "general",
                vec![
                    ClinicPrior::new("lab", 1.0, 10),
                    ClinicPrior::new("xray", 1.0, 15),
                    ClinicPrior::new("vitals", 0.8, 5),
                    ClinicPrior::new("eye", 1.0, 10),
                    ClinicPrior::new("physician", 1.5, 20),
                ],
            ),
            ExamTemplate::new(
                "employment",
                vec![
                    ClinicPrior::new("lab", 1.0, 10),
                    ClinicPrior::new("xray", 1.0, 15),
                    ClinicPrior::new("vitals", 0.8, 5),
                    ClinicPrior::new("audiometry", 1.0, 15),
                    ClinicPrior::new("physician", 1.5, 20),
                ],
            ),
            ExamTemplate::new(
                "driver_license",
                vec![
                    ClinicPrior::new("vitals", 0.8, 5),
                    ClinicPrior::new("eye", 1.0, 10),
                    ClinicPrior::new("audiometry", 1.0, 15),
                    ClinicPrior::new("physician", 1.5, 20),
                ],
            ),
            ExamTemplate::new(
                "comprehensive",
                vec![
                    ClinicPrior::new("lab", 1.0, 10),
                    ClinicPrior::new("xray", 1.0, 15),
                    ClinicPrior::new("ecg", 1.2, 15),
                    ClinicPrior::new("ultrasound", 1.5, 25),
                    ClinicPrior::new("vitals", 0.8, 5),
                    ClinicPrior::new("eye", 1.0, 10),
                    ClinicPrior::new("dental", 1.0, 15),
                    ClinicPrior::new("physician", 1.5, 20),
                ],
            ),
        ];
        for template in templates {
            catalog.templates.insert(template.exam_type.clone(), template);
        }
        catalog
    }

    /// Add or replace an exam type
    pub fn insert(&mut self, template: ExamTemplate) -> Result<()> {
        template.validate()?;
        self.templates.insert(template.exam_type.clone(), template);
        Ok(())
    }

    pub fn get(&self, exam_type: &str) -> Option<&ExamTemplate> {
        self.templates.get(exam_type)
    }
}
