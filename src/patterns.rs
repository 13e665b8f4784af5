//! Pattern detection (§4.6): pure, re-runnable functions over the
//! ledger. Patterns are signals fed into calibration, never treated
//! as truth in their own right.

use crate::domain::Domain;
use crate::types::{DecisionEvent, Mode, Outcome, OutcomeResult, Pattern, PatternKind};
use chrono::Utc;
use std::collections::HashMap;

/// §4.6 + §9 open question: the minimum sample size for
/// percentage-based detectors (`outcome_pattern`) isn't stated by the
/// source; 3 events is assumed as the testability floor.
const OUTCOME_PATTERN_MIN_SAMPLE: usize = 3;
const MIN_FREQUENCY: u32 = 2;

fn pattern_id(kind: PatternKind, domain: Option<Domain>) -> String {
    format!(
        "{}:{}",
        match kind {
            PatternKind::RepetitionLoop => "repetition_loop",
            PatternKind::OverrideLoop => "override_loop",
            PatternKind::EmotionalLoop => "emotional_loop",
            PatternKind::OutcomePattern => "outcome_pattern",
            PatternKind::WarEscalationBias => "war_escalation_bias",
            PatternKind::WarFalseUrgencyLoop => "war_false_urgency_loop",
            PatternKind::WarRepeatedOverrides => "war_repeated_overrides",
        },
        domain.map(|d| d.as_str()).unwrap_or("*")
    )
}

/// `detect_patterns(events, outcomes) -> list<Pattern>` (§4.6).
pub fn detect_patterns(events: &[DecisionEvent], outcomes: &[Outcome]) -> Vec<Pattern> {
    let mut patterns = Vec::new();
    patterns.extend(repetition_loop(events));
    patterns.extend(override_loop(events, false));
    patterns.extend(emotional_loop(events));
    patterns.extend(outcome_pattern(events, outcomes));
    patterns.extend(war_escalation_bias(events, outcomes));
    patterns.extend(war_false_urgency_loop(events, outcomes));
    patterns.extend(override_loop(events, true));
    patterns
}

fn repetition_loop(events: &[DecisionEvent]) -> Vec<Pattern> {
    let mut counts: HashMap<(Domain, String), u32> = HashMap::new();
    for event in events {
        for illusion in &event.illusions_detected {
            *counts.entry((event.domain, illusion.clone())).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count >= MIN_FREQUENCY)
        .map(|((domain, illusion), count)| Pattern {
            pattern_id: format!("repetition_loop:{}:{illusion}", domain.as_str()),
            kind: PatternKind::RepetitionLoop,
            description: format!("illusion '{illusion}' repeated {count} times in {domain}"),
            domain: Some(domain),
            frequency: count,
            last_seen: Utc::now(),
            last_outcome: None,
        })
        .collect()
}

fn override_loop(events: &[DecisionEvent], war_only: bool) -> Vec<Pattern> {
    let mut counts: HashMap<Domain, u32> = HashMap::new();
    for event in events {
        if war_only && event.mode != Mode::War {
            continue;
        }
        if event.action_followed_counsel == Some(false) {
            *counts.entry(event.domain).or_insert(0) += 1;
        }
    }
    let kind = if war_only { PatternKind::WarRepeatedOverrides } else { PatternKind::OverrideLoop };
    counts
        .into_iter()
        .filter(|(_, count)| *count >= MIN_FREQUENCY)
        .map(|(domain, count)| Pattern {
            pattern_id: pattern_id(kind, Some(domain)),
            kind,
            description: format!("sovereign overrode counsel {count} times in {domain}"),
            domain: Some(domain),
            frequency: count,
            last_seen: Utc::now(),
            last_outcome: None,
        })
        .collect()
}

fn emotional_loop(events: &[DecisionEvent]) -> Vec<Pattern> {
    let mut counts: HashMap<Domain, u32> = HashMap::new();
    for event in events {
        if event.emotional_load > 0.6 {
            *counts.entry(event.domain).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count >= MIN_FREQUENCY)
        .map(|(domain, count)| Pattern {
            pattern_id: pattern_id(PatternKind::EmotionalLoop, Some(domain)),
            kind: PatternKind::EmotionalLoop,
            description: format!("high emotional load on {count} events in {domain}"),
            domain: Some(domain),
            frequency: count,
            last_seen: Utc::now(),
            last_outcome: None,
        })
        .collect()
}

fn outcome_pattern(events: &[DecisionEvent], outcomes: &[Outcome]) -> Vec<Pattern> {
    let outcome_by_event: HashMap<_, _> = outcomes.iter().map(|o| (o.event_id, o.result)).collect();
    let mut by_domain: HashMap<Domain, Vec<OutcomeResult>> = HashMap::new();
    for event in events {
        if let Some(&result) = outcome_by_event.get(&event.event_id) {
            by_domain.entry(event.domain).or_default().push(result);
        }
    }

    by_domain
        .into_iter()
        .filter_map(|(domain, results)| {
            if results.len() < OUTCOME_PATTERN_MIN_SAMPLE {
                return None;
            }
            let mut tally: HashMap<&str, usize> = HashMap::new();
            for r in &results {
                *tally.entry(result_key(*r)).or_insert(0) += 1;
            }
            let (dominant, count) = tally.into_iter().max_by_key(|(_, c)| *c)?;
            if count as f64 / results.len() as f64 >= 0.70 {
                Some(Pattern {
                    pattern_id: pattern_id(PatternKind::OutcomePattern, Some(domain)),
                    kind: PatternKind::OutcomePattern,
                    description: format!("{dominant} outcome dominates {domain} ({count}/{})", results.len()),
                    domain: Some(domain),
                    frequency: count as u32,
                    last_seen: Utc::now(),
                    last_outcome: Some(parse_result_key(dominant)),
                })
            } else {
                None
            }
        })
        .collect()
}

fn war_escalation_bias(events: &[DecisionEvent], outcomes: &[Outcome]) -> Vec<Pattern> {
    let outcome_by_event: HashMap<_, _> = outcomes.iter().map(|o| (o.event_id, o)).collect();
    let escalations: Vec<_> = events
        .iter()
        .filter(|e| e.mode == Mode::War && e.posture.to_lowercase().contains("escalat"))
        .collect();
    if escalations.len() < MIN_FREQUENCY as usize {
        return Vec::new();
    }
    let damages: Vec<f64> = escalations
        .iter()
        .filter_map(|e| outcome_by_event.get(&e.event_id).map(|o| o.damage))
        .collect();
    if damages.is_empty() {
        return Vec::new();
    }
    let avg_damage = damages.iter().sum::<f64>() / damages.len() as f64;
    if avg_damage <= 0.3 {
        return Vec::new();
    }
    vec![Pattern {
        pattern_id: "war_escalation_bias:*".to_string(),
        kind: PatternKind::WarEscalationBias,
        description: format!(
            "{} war escalations with average damage {avg_damage:.2}",
            escalations.len()
        ),
        domain: None,
        frequency: escalations.len() as u32,
        last_seen: Utc::now(),
        last_outcome: None,
    }]
}

fn war_false_urgency_loop(events: &[DecisionEvent], outcomes: &[Outcome]) -> Vec<Pattern> {
    let outcome_by_event: HashMap<_, _> = outcomes.iter().map(|o| (o.event_id, o.result)).collect();
    let count = events
        .iter()
        .filter(|e| {
            e.mode == Mode::War
                && e.urgency > 0.7
                && outcome_by_event.get(&e.event_id) == Some(&OutcomeResult::Failure)
        })
        .count();
    if count < MIN_FREQUENCY as usize {
        return Vec::new();
    }
    vec![Pattern {
        pattern_id: "war_false_urgency_loop:*".to_string(),
        kind: PatternKind::WarFalseUrgencyLoop,
        description: format!("{count} high-urgency war events resolved as failure"),
        domain: None,
        frequency: count as u32,
        last_seen: Utc::now(),
        last_outcome: Some(OutcomeResult::Failure),
    }]
}

fn result_key(r: OutcomeResult) -> &'static str {
    match r {
        OutcomeResult::Success => "success",
        OutcomeResult::Partial => "partial",
        OutcomeResult::Failure => "failure",
    }
}

fn parse_result_key(s: &str) -> OutcomeResult {
    match s {
        "success" => OutcomeResult::Success,
        "partial" => OutcomeResult::Partial,
        _ => OutcomeResult::Failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn war_event(domain: Domain, urgency: f64, posture: &str) -> DecisionEvent {
        DecisionEvent {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            domain,
            stakes: None,
            emotional_load: 0.3,
            urgency,
            ministers_called: vec![],
            verdict_summary: "x".to_string(),
            posture: posture.to_string(),
            illusions_detected: vec![],
            contradictions_found: 0,
            mode: Mode::War,
            sovereign_action: None,
            action_followed_counsel: None,
            override_reason: None,
        }
    }

    // S7: pattern + calibration scenario.
    #[test]
    fn war_escalation_bias_fires_on_three_damaging_events() {
        let events: Vec<DecisionEvent> = (0..3)
            .map(|_| war_event(Domain::Diplomacy, 0.5, "escalate"))
            .collect();
        let outcomes: Vec<Outcome> = events
            .iter()
            .map(|e| Outcome {
                event_id: e.event_id,
                resolved_at: Utc::now(),
                result: OutcomeResult::Failure,
                damage: 0.7,
                benefit: 0.0,
                lessons: vec![],
            })
            .collect();

        let patterns = detect_patterns(&events, &outcomes);
        let found = patterns.iter().find(|p| p.kind == PatternKind::WarEscalationBias).unwrap();
        assert_eq!(found.frequency, 3);
    }

    #[test]
    fn below_threshold_frequency_is_not_a_pattern() {
        let events = vec![war_event(Domain::Diplomacy, 0.5, "escalate")];
        let outcomes = vec![Outcome {
            event_id: events[0].event_id,
            resolved_at: Utc::now(),
            result: OutcomeResult::Failure,
            damage: 0.8,
            benefit: 0.0,
            lessons: vec![],
        }];
        let patterns = detect_patterns(&events, &outcomes);
        assert!(patterns.iter().all(|p| p.kind != PatternKind::WarEscalationBias));
    }

    #[test]
    fn war_false_urgency_loop_requires_failure_outcomes() {
        let events: Vec<DecisionEvent> = (0..2)
            .map(|_| war_event(Domain::Conflict, 0.9, "advance"))
            .collect();
        let outcomes: Vec<Outcome> = events
            .iter()
            .map(|e| Outcome {
                event_id: e.event_id,
                resolved_at: Utc::now(),
                result: OutcomeResult::Failure,
                damage: 0.5,
                benefit: 0.0,
                lessons: vec![],
            })
            .collect();
        let patterns = detect_patterns(&events, &outcomes);
        assert!(patterns.iter().any(|p| p.kind == PatternKind::WarFalseUrgencyLoop));
    }
}
