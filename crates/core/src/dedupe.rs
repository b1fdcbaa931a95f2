//! Collapses near-coincident detections.
//!
//! Single greedy pass: each incoming detection is compared against the
//! detections accepted so far. If none is closer than `min_distance` it is
//! accepted. Otherwise it replaces its close neighbours only when it beats
//! all of them, and is dropped if not. The accepted set therefore stays
//! pairwise separated, while the outcome still depends on input order.

use crate::types::Detection;

pub fn dedupe(detections: Vec<Detection>, min_distance: f64) -> Vec<Detection> {
    if detections.len() <= 1 {
        return detections;
    }

    let mut accepted: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        let center = det.center();
        let near: Vec<usize> = accepted
            .iter()
            .enumerate()
            .filter(|(_, a)| a.center().distance(&center) < min_distance)
            .map(|(i, _)| i)
            .collect();

        if near.is_empty() {
            accepted.push(det);
            continue;
        }

        if near.iter().all(|&i| det.confidence > accepted[i].confidence) {
            for &i in near.iter().rev() {
                accepted.remove(i);
            }
            accepted.push(det);
        }
    }
    accepted
}
