//! Calibration (§4.6): bounded multiplicative updates derived from
//! detected patterns. Explicitly simple and deterministic - not the
//! Bayesian/Thompson-sampling machinery a generic evaluation harness
//! might reach for (see DESIGN.md), because the posture knobs here
//! are a handful of clamped multipliers, not probability distributions.

use crate::types::{Calibration, Pattern, PatternKind};

const CAUTION_FLOOR: f64 = 0.3;
const URGENCY_THRESHOLD_CEILING: f64 = 3.0;
const BLUNTNESS_CEILING: f64 = 2.0;

/// `calibrate(patterns) -> CalibrationSet` (§4.6): starts from the
/// stored calibration and applies bounded multiplicative updates so a
/// single pattern can never collapse posture in one step.
pub fn calibrate(prior: &Calibration, patterns: &[Pattern]) -> Calibration {
    let mut next = prior.clone();

    for pattern in patterns {
        if pattern.domain.is_some() && pattern.domain != prior.domain {
            continue;
        }
        match pattern.kind {
            PatternKind::WarEscalationBias => {
                next.caution = (next.caution * 0.7).max(CAUTION_FLOOR);
            }
            PatternKind::WarFalseUrgencyLoop => {
                next.urgency_threshold = (next.urgency_threshold * 1.5).min(URGENCY_THRESHOLD_CEILING);
            }
            PatternKind::WarRepeatedOverrides => {
                next.bluntness = (next.bluntness * 1.3).min(BLUNTNESS_CEILING);
            }
            _ => {}
        }
    }

    next.updated_at = chrono::Utc::now();
    next
}
