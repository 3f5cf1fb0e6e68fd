//! Post-processing shared by all backends: confidence filtering followed by
//! class-wise non-maximum suppression.

use crate::detect::result::Detection;

/// Drop candidates whose confidence is below `confidence_threshold`.
pub fn filter_confidence(candidates: Vec<Detection>, confidence_threshold: f32) -> Vec<Detection> {
    candidates
        .into_iter()
        .filter(|det| det.confidence >= confidence_threshold)
        .collect()
}

/// Class-wise non-maximum suppression.
///
/// Candidates are visited in descending confidence order (ties keep input
/// order). A candidate is dropped when it overlaps an already kept box of the
/// same label with IoU >= `overlap_threshold`. Disjoint boxes never suppress
/// each other, even at a threshold of zero.
pub fn non_max_suppression(mut candidates: Vec<Detection>, overlap_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let duplicate = keep.iter().any(|kept| {
            if kept.label != candidate.label {
                return false;
            }
            let iou = kept.bbox.iou(&candidate.bbox);
            iou > 0.0 && iou >= overlap_threshold
        });
        if !duplicate {
            keep.push(candidate);
        }
    }
    keep
}
