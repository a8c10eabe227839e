//! Router Module
//!
//! Sticky, load-weighted clinic order per patient and exam type.
//!
//! ## Algorithm
//! 1. Read the waiting count of every candidate clinic of the exam type
//! 2. `score = queueLength * priorityWeight * (avgServiceTimeMinutes / 10)`
//! 3. Sort ascending (ties keep template order)
//! 4. Force "lab" first and "xray" second when present
//! 5. Persist; later calls return the stored path untouched

mod template;
mod path;
mod path_router;
pub mod scoring;

pub use template::{ClinicPrior, ExamTemplate, TemplateCatalog};
pub use path::{Advance, PatientPath, ProgressEntry};
pub use path_router::PathRouter;
