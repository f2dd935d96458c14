//! Confidence calibration across extraction sources

use serde::{Deserialize, Serialize};

/// Boost applied when text and vision extraction agree a field exists
const AGREEMENT_BOOST: f64 = 1.15;

/// Penalty applied when only one source found the field
const SINGLE_SOURCE_PENALTY: f64 = 0.85;

/// Combine text and vision confidences for one field.
///
/// Both sources → `min(max × 1.15, 1)`, one source → its confidence × 0.85,
/// neither → 0. The result is always within [0, 1].
pub fn cross_validate_confidence(
    text_confidence: f64,
    text_found: bool,
    vision_confidence: f64,
    vision_found: bool,
) -> f64 {
    let text_confidence = sanitize(text_confidence);
    let vision_confidence = sanitize(vision_confidence);

    let combined = match (text_found, vision_found) {
        (true, true) => text_confidence.max(vision_confidence) * AGREEMENT_BOOST,
        (true, false) => text_confidence * SINGLE_SOURCE_PENALTY,
        (false, true) => vision_confidence * SINGLE_SOURCE_PENALTY,
        (false, false) => 0.0,
    };
    combined.clamp(0.0, 1.0)
}

fn sanitize(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Advisory verdict on how much a drawing yielded relative to its size
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageAssessment {
    pub suspicious: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

/// Flag drawings whose extraction yield looks too thin to trust.
///
/// Never changes extracted data; the result is surfaced for human review.
pub fn check_coverage_density(
    page_count: usize,
    note_count: usize,
    gdt_count: usize,
    has_tolerances: bool,
    has_title_block: bool,
) -> CoverageAssessment {
    let mut reasons = Vec::new();

    if page_count >= 2 && note_count + gdt_count <= 1 && !has_tolerances {
        reasons.push(format!(
            "{} pages yielded {} notes, {} GD&T callouts and no tolerances",
            page_count, note_count, gdt_count
        ));
    }
    if has_title_block && note_count == 0 {
        reasons.push("title block found but no notes".to_string());
    }

    CoverageAssessment {
        suspicious: !reasons.is_empty(),
        reasons,
    }
}
