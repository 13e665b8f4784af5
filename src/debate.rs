//! Debate engine & tribunal (§4.4): positions are produced
//! independently, conflicts are typed and pure functions of the
//! position set, and the final verdict never invents strategy - it
//! only composes what ministers already said.

use crate::types::{
    ConflictEvent, ConflictKind, DebateProceedings, MinisterId, MinisterPosition, Severity,
    Stance, TribunalDecision, TribunalVerdict,
};
const VETO_MINISTERS: [MinisterId; 3] = [MinisterId::Risk, MinisterId::Truth, MinisterId::Optionality];
const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.65;

/// Below this, a position's advice must not be presented as
/// authoritative (§8 invariant 15) - distinct from, and lower than,
/// `HIGH_CONFIDENCE_THRESHOLD`, which governs conflict detection.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Conducts a debate over an already-produced, order-independent set
/// of positions (§5: "no hidden dependence on arrival order").
pub fn conduct_debate(positions: Vec<MinisterPosition>) -> DebateProceedings {
    let conflicts = detect_conflicts(&positions);
    let tribunal_verdict = if conflicts.is_empty() {
        None
    } else {
        Some(resolve_tribunal(&conflicts, &positions))
    };
    let final_verdict = frame_final_verdict(&positions, &tribunal_verdict);
    let flagged_low_confidence = positions
        .iter()
        .filter(|p| p.confidence < LOW_CONFIDENCE_THRESHOLD)
        .map(|p| p.minister)
        .collect();

    DebateProceedings {
        positions,
        conflicts,
        tribunal_verdict,
        final_verdict,
        flagged_low_confidence,
    }
}

fn detect_conflicts(positions: &[MinisterPosition]) -> Vec<ConflictEvent> {
    let mut conflicts = Vec::new();

    // STANCE_CONFLICT: any ADVANCE/AVOID pair both above 0.65 confidence.
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            let (a, b) = (&positions[i], &positions[j]);
            let is_pair = matches!(
                (a.stance, b.stance),
                (Stance::Advance, Stance::Avoid) | (Stance::Avoid, Stance::Advance)
            );
            if is_pair && a.confidence > HIGH_CONFIDENCE_THRESHOLD && b.confidence > HIGH_CONFIDENCE_THRESHOLD {
                let severity = if a.confidence > 0.85 || b.confidence > 0.85 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                conflicts.push(ConflictEvent {
                    kind: ConflictKind::StanceConflict,
                    severity,
                    parties: vec![a.minister, b.minister],
                    reason: format!("{} advances while {} avoids, both above threshold", a.minister, b.minister),
                });
            }
        }
    }

    // VETO_CONFLICT: a STOP from Risk, Truth, or Optionality.
    for position in positions {
        if position.stance == Stance::Stop && VETO_MINISTERS.contains(&position.minister) {
            conflicts.push(ConflictEvent {
                kind: ConflictKind::VetoConflict,
                severity: Severity::High,
                parties: vec![position.minister],
                reason: format!("{} invoked a veto stop", position.minister),
            });
        }
    }

    // FACTUAL_UNCERTAINTY: any position with non-empty violations.
    for position in positions {
        if !position.violations.is_empty() {
            conflicts.push(ConflictEvent {
                kind: ConflictKind::FactualUncertainty,
                severity: Severity::High,
                parties: vec![position.minister],
                reason: "position reports factual violations".to_string(),
            });
        }
    }

    // IRREVERSIBILITY_CONFLICT: Risk mentions irreversibility, another stance is ADVANCE.
    if let Some(risk) = positions.iter().find(|p| p.minister == MinisterId::Risk) {
        if risk.justification.to_lowercase().contains("irreversib") {
            for other in positions {
                if other.minister != MinisterId::Risk && other.stance == Stance::Advance {
                    conflicts.push(ConflictEvent {
                        kind: ConflictKind::IrreversibilityConflict,
                        severity: Severity::High,
                        parties: vec![MinisterId::Risk, other.minister],
                        reason: "Risk flagged irreversibility against an advancing position".to_string(),
                    });
                }
            }
        }
    }

    conflicts
}

/// Priority order (§4.4): FACTUAL_UNCERTAINTY (HIGH) > VETO > IRREVERSIBILITY > STANCE_CONFLICT.
fn resolve_tribunal(conflicts: &[ConflictEvent], positions: &[MinisterPosition]) -> TribunalVerdict {
    if conflicts.iter().any(|c| c.kind == ConflictKind::FactualUncertainty && c.severity == Severity::High) {
        let required_data: Vec<String> = positions
            .iter()
            .filter(|p| p.minister == MinisterId::Truth)
            .flat_map(|p| p.violations.clone())
            .collect();
        return TribunalVerdict {
            decision: TribunalDecision::DelayPendingData,
            constraints: Vec::new(),
            required_data,
            reasoning: "factual uncertainty must be resolved before proceeding".to_string(),
        };
    }

    if conflicts.iter().any(|c| c.kind == ConflictKind::VetoConflict) {
        return TribunalVerdict {
            decision: TribunalDecision::Abort,
            constraints: Vec::new(),
            required_data: Vec::new(),
            reasoning: "a veto-empowered minister invoked STOP".to_string(),
        };
    }

    if conflicts.iter().any(|c| c.kind == ConflictKind::IrreversibilityConflict) {
        return TribunalVerdict {
            decision: TribunalDecision::Escalate,
            constraints: Vec::new(),
            required_data: Vec::new(),
            reasoning: "an irreversible action is contested".to_string(),
        };
    }

    let constraints: Vec<String> = positions
        .iter()
        .flat_map(|p| p.constraints.clone())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    TribunalVerdict {
        decision: TribunalDecision::AllowWithConstraints,
        constraints,
        required_data: Vec::new(),
        reasoning: "mixed-confidence stance conflict resolved with constraints".to_string(),
    }
}

fn frame_final_verdict(positions: &[MinisterPosition], verdict: &Option<TribunalVerdict>) -> String {
    if let Some(v) = verdict {
        return match v.decision {
            TribunalDecision::Silence => "SILENCE: no action recommended".to_string(),
            TribunalDecision::DelayPendingData => {
                format!("DELAY_PENDING_DATA: gather {}", v.required_data.join(", "))
            }
            TribunalDecision::Abort => "ABORT: veto invoked".to_string(),
            TribunalDecision::Escalate => "ESCALATE: irreversibility contested".to_string(),
            TribunalDecision::AllowWithConstraints => {
                format!("ALLOW_WITH_CONSTRAINTS: {}", v.constraints.join(", "))
            }
        };
    }

    if positions.is_empty() {
        return "SILENCE: no ministers convened".to_string();
    }

    let mut counts: Vec<(Stance, usize)> = Vec::new();
    for position in positions {
        match counts.iter_mut().find(|(s, _)| *s == position.stance) {
            Some((_, n)) => *n += 1,
            None => counts.push((position.stance, 1)),
        }
    }
    let total = positions.len();
    if let Some(&(stance, count)) = counts.iter().max_by_key(|(_, c)| *c) {
        if count * 3 >= total * 2 {
            return format!("{}: majority of ministers concur", stance.as_str());
        }
    }
    "CONDITIONAL: no clear majority".to_string()
}
