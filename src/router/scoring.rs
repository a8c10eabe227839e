//! Pure path computation.
//!
//! Everything here is deterministic and side-effect free: the router reads
//! the queue lengths, these functions turn them into an order.

/// Specimen collection happens before any imaging, regardless of load.
pub const MANDATORY_FIRST: &str = "lab";
pub const MANDATORY_SECOND: &str = "xray";

/// One candidate clinic with the load observed at compute time
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub clinic_id: String,
    pub queue_length: u32,
    pub priority_weight: f64,
    pub avg_service_time_minutes: u32,
}

/// `queueLength * priorityWeight * (avgServiceTimeMinutes / 10)`; lower is better
#[inline]
pub fn score(queue_length: u32, priority_weight: f64, avg_service_time_minutes: u32) -> f64 {
    f64::from(queue_length) * priority_weight * (f64::from(avg_service_time_minutes) / 10.0)
}

/// Ascending by score; equal scores keep candidate order
pub fn sort_by_score(candidates: &[Candidate]) -> Vec<String> {
    let mut scored: Vec<(&Candidate, f64)> = candidates
        .iter()
        .map(|c| (c, score(c.queue_length, c.priority_weight, c.avg_service_time_minutes)))
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.into_iter().map(|(c, _)| c.clinic_id.clone()).collect()
}

/// Move "lab" to the front and "xray" right behind it (or to the front when
/// there is no lab). Everything else keeps its relative order.
pub fn apply_mandatory_order(mut order: Vec<String>) -> Vec<String> {
    let mut slot = 0;
    for clinic in [MANDATORY_FIRST, MANDATORY_SECOND] {
        if let Some(pos) = order.iter().position(|c| c == clinic) {
            let id = order.remove(pos);
            order.insert(slot, id);
            slot += 1;
        }
    }
    order
}

/// `Σ (queueLength_i + 1) * avgServiceTimeMinutes_i`
pub fn total_estimated_minutes(candidates: &[Candidate]) -> u32 {
    candidates
        .iter()
        .map(|c| (c.queue_length + 1).saturating_mul(c.avg_service_time_minutes))
        .fold(0u32, u32::saturating_add)
}

/// Full ordering: score sort, then the mandatory override
pub fn order_clinics(candidates: &[Candidate]) -> Vec<String> {
    apply_mandatory_order(sort_by_score(candidates))
}
