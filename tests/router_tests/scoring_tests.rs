//! Tests for the pure path scoring functions

use clinicq::router::scoring::{
    apply_mandatory_order, order_clinics, score, sort_by_score, total_estimated_minutes,
    Candidate,
};

fn candidate(clinic_id: &str, queue_length: u32, priority_weight: f64, avg: u32) -> Candidate {
    Candidate {
        clinic_id: clinic_id.to_string(),
        queue_length,
        priority_weight,
        avg_service_time_minutes: avg,
    }
}

fn ids(clinics: &[&str]) -> Vec<String> {
    clinics.iter().map(|c| c.to_string()).collect()
}

// =============================================================================
// Score
// =============================================================================

#[test]
fn test_score_formula() {
    assert_eq!(score(0, 1.5, 20), 0.0);
    assert!((score(4, 1.0, 10) - 4.0).abs() < 1e-12);
    assert!((score(3, 1.5, 20) - 9.0).abs() < 1e-12);
    assert!((score(2, 0.8, 5) - 0.8).abs() < 1e-12);
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_sort_ascending() {
    let candidates = vec![
        candidate("a", 5, 1.0, 10),
        candidate("b", 1, 1.0, 10),
        candidate("c", 3, 1.0, 10),
    ];
    assert_eq!(sort_by_score(&candidates), ids(&["b", "c", "a"]));
}

#[test]
fn test_ties_keep_candidate_order() {
    let candidates = vec![
        candidate("z", 0, 1.0, 10),
        candidate("m", 2, 1.0, 10),
        candidate("a", 0, 2.0, 30),
        candidate("q", 1, 2.0, 10),
    ];
    // m and q both score 2.0
    assert_eq!(sort_by_score(&candidates), ids(&["z", "a", "m", "q"]));
}

#[test]
fn test_mandatory_order_lab_then_xray() {
    let order = ids(&["eye", "xray", "vitals", "lab"]);
    assert_eq!(
        apply_mandatory_order(order),
        ids(&["lab", "xray", "eye", "vitals"])
    );
}

#[test]
fn test_mandatory_order_only_xray() {
    let order = ids(&["eye", "vitals", "xray"]);
    assert_eq!(apply_mandatory_order(order), ids(&["xray", "eye", "vitals"]));
}

#[test]
fn test_mandatory_order_neither_present() {
    let order = ids(&["eye", "vitals"]);
    assert_eq!(apply_mandatory_order(order.clone()), order);
}

#[test]
fn test_busy_lab_still_first() {
    let candidates = vec![
        candidate("lab", 40, 1.0, 10),
        candidate("xray", 30, 1.0, 15),
        candidate("eye", 0, 1.0, 10),
    ];
    assert_eq!(order_clinics(&candidates), ids(&["lab", "xray", "eye"]));
}

// =============================================================================
// Estimates
// =============================================================================

#[test]
fn test_total_estimated_minutes() {
    let candidates = vec![
        candidate("lab", 2, 1.0, 10),
        candidate("xray", 0, 1.0, 15),
        candidate("eye", 1, 1.0, 10),
    ];
    assert_eq!(total_estimated_minutes(&candidates), 30 + 15 + 20);
    assert_eq!(total_estimated_minutes(&[]), 0);
}
