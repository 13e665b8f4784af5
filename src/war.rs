//! War pipeline (§4.5): four deterministic gates layered on top of the
//! normal pipeline. No LLM decides what gets filtered - everything
//! here is a pure function of its inputs.

use crate::domain::{Domain, Tone};
use crate::types::{BookMetadata, MinisterId, Reversibility};
use std::collections::BTreeSet;

/// Forbidden-intent signals scanned for in a war-mode goal (§4.5, S4).
const FORBIDDEN_SIGNALS: &[&str] = &[
    "target individual",
    "frame them",
    "illegal action",
    "assassinate",
    "blackmail",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feasibility {
    Viable,
    Blocked { matched_signal: String },
}

#[derive(Debug, Clone)]
pub struct WarGoal {
    pub goal: String,
    pub domain: Domain,
    pub reversibility: Reversibility,
    pub urgency: f64,
    pub emotional_load: f64,
}

#[derive(Debug, Clone)]
pub struct ConstraintGateResult {
    pub feasibility: Feasibility,
    pub recommended_posture: String,
}

/// §4.5 constraint gate. Scans `goal` for forbidden-intent signals; a
/// match terminates the pipeline here (§8 invariant 14).
pub fn constraint_gate(input: &WarGoal) -> ConstraintGateResult {
    let lower = input.goal.to_lowercase();
    match FORBIDDEN_SIGNALS.iter().find(|sig| lower.contains(*sig)) {
        Some(signal) => ConstraintGateResult {
            feasibility: Feasibility::Blocked {
                matched_signal: signal.to_string(),
            },
            recommended_posture: "halt".to_string(),
        },
        None => ConstraintGateResult {
            feasibility: Feasibility::Viable,
            recommended_posture: "proceed".to_string(),
        },
    }
}

const PREFERRED_MINISTERS: [MinisterId; 9] = [
    MinisterId::Power,
    MinisterId::Psychology,
    MinisterId::Conflict,
    MinisterId::Intelligence,
    MinisterId::Narrative,
    MinisterId::Timing,
    MinisterId::Optionality,
    MinisterId::Truth,
    MinisterId::Risk,
];
const CONDITIONAL_MINISTERS: [MinisterId; 4] = [
    MinisterId::Legitimacy,
    MinisterId::Technology,
    MinisterId::Data,
    MinisterId::Operations,
];
const DEPRIORITIZED_MINISTERS: [MinisterId; 2] = [MinisterId::Diplomacy, MinisterId::Strategy];

const COUNCIL_MIN: usize = 3;
const COUNCIL_MAX: usize = 5;

#[derive(Debug, Clone)]
pub struct CouncilAudit {
    pub selected: Vec<MinisterId>,
    pub leverage_count: usize,
    pub soft_count: usize,
    pub guardrails_present: bool,
}

/// §4.5 council selection. A pure function of the query's domain tags
/// - same tags always select the same council (§8 invariant 13).
pub fn select_council(domain_tags: &BTreeSet<Domain>) -> CouncilAudit {
    let mut selected: Vec<MinisterId> = vec![MinisterId::Truth, MinisterId::Risk];

    for &minister in &PREFERRED_MINISTERS {
        if selected.len() >= COUNCIL_MAX {
            break;
        }
        if !selected.contains(&minister) {
            selected.push(minister);
        }
    }

    for &minister in &CONDITIONAL_MINISTERS {
        if selected.len() >= COUNCIL_MAX {
            break;
        }
        let minister_domain = minister_conditional_domain(minister);
        if domain_tags.contains(&minister_domain) && !selected.contains(&minister) {
            selected.push(minister);
        }
    }

    if selected.len() < COUNCIL_MIN {
        for &minister in &DEPRIORITIZED_MINISTERS {
            if selected.len() >= COUNCIL_MIN {
                break;
            }
            if !selected.contains(&minister) {
                selected.push(minister);
            }
        }
    }

    selected.truncate(COUNCIL_MAX);

    let leverage_count = selected.iter().filter(|m| PREFERRED_MINISTERS.contains(m)).count();
    let soft_count = selected
        .iter()
        .filter(|m| CONDITIONAL_MINISTERS.contains(m) || DEPRIORITIZED_MINISTERS.contains(m))
        .count();

    CouncilAudit {
        guardrails_present: selected.contains(&MinisterId::Truth) && selected.contains(&MinisterId::Risk),
        selected,
        leverage_count,
        soft_count,
    }
}

fn minister_conditional_domain(minister: MinisterId) -> Domain {
    match minister {
        MinisterId::Legitimacy => Domain::Law,
        MinisterId::Technology => Domain::Organization,
        MinisterId::Data => Domain::Intelligence,
        MinisterId::Operations => Domain::Organization,
        _ => Domain::Strategy,
    }
}

const PREFERRED_DOMAINS: [Domain; 4] = [Domain::Conflict, Domain::Power, Domain::Strategy, Domain::Timing];
const DEPRIORITIZED_DOMAINS: [Domain; 2] = [Domain::Diplomacy, Domain::Morality];
const PREFERRED_TONES: [Tone; 2] = [Tone::Ruthless, Tone::Aggressive];
const DEPRIORITIZED_TONES: [Tone; 2] = [Tone::Idealistic, Tone::Patient];

const BOOK_BIAS_MIN: usize = 2;
const BOOK_BIAS_MAX: usize = 5;

#[derive(Debug, Clone)]
pub struct ScoredBook {
    pub book_id: String,
    pub score: f64,
}

/// §4.5 book-retrieval bias. Selection, not censorship: every book
/// stays in the store, only war-mode retrieval is constrained to the
/// top-scoring subset.
pub fn book_retrieval_bias(books: &[BookMetadata]) -> Vec<ScoredBook> {
    let mut scored: Vec<ScoredBook> = books
        .iter()
        .map(|book| {
            let mut s = 0.0;
            for d in &book.domains {
                if PREFERRED_DOMAINS.contains(d) {
                    s += 2.0;
                }
                if DEPRIORITIZED_DOMAINS.contains(d) {
                    s -= 1.5;
                }
            }
            for t in &book.tones {
                if PREFERRED_TONES.contains(t) {
                    s += 1.5;
                }
                if DEPRIORITIZED_TONES.contains(t) {
                    s -= 0.8;
                }
            }
            s *= book.priority.war;
            ScoredBook {
                book_id: book.book_id.clone(),
                score: s,
            }
        })
        .filter(|b| b.score > 0.0)
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.book_id.cmp(&b.book_id))
    });

    let keep = scored.len().clamp(BOOK_BIAS_MIN.min(scored.len()), BOOK_BIAS_MAX);
    scored.truncate(keep);
    scored
}

const REFUSAL_PHRASES: &[&str] = &[
    "I cannot help with this",
    "this is unethical",
    "this is wrong",
];

/// Full conceptual-pattern list (step 2): language that softens a
/// position into a non-decision. Ministers without a customized
/// override (step 4) suppress the whole list; the named ministers
/// below suppress only the subset their voice actually produces.
const CONCEPTUAL_PATTERNS: &[&str] = &[
    "in an ideal world",
    "let's compromise",
    "meet in the middle",
    "long-term relationship",
    "play it safe",
    "wait and see",
    "everyone wins",
];

/// §4.5 step 4: per-minister customized subset of `CONCEPTUAL_PATTERNS`.
/// Truth never reaches this (exempt outright); ministers not named by
/// the override rule fall through to the full list.
fn conceptual_patterns_for(minister: MinisterId) -> &'static [&'static str] {
    match minister {
        MinisterId::Power => &["let's compromise", "meet in the middle", "everyone wins"],
        MinisterId::Psychology => &["in an ideal world", "everyone wins"],
        MinisterId::Conflict => &["wait and see", "play it safe", "meet in the middle"],
        MinisterId::Diplomacy => &["everyone wins"],
        MinisterId::Strategy => &["wait and see", "in an ideal world"],
        MinisterId::Risk => &["play it safe"],
        MinisterId::Optionality => &["long-term relationship", "meet in the middle"],
        _ => CONCEPTUAL_PATTERNS,
    }
}

#[derive(Debug, Clone)]
pub struct FilteredSpeech {
    pub original: String,
    pub filtered: String,
    pub phrases_removed: usize,
    pub patterns_suppressed: usize,
    pub mandatory_added: Vec<String>,
    pub was_filtered: bool,
}

/// §4.5 speech filter, all four steps in order. Truth is exempt by
/// the per-minister override rule (never filtered); every other
/// minister's text passes through refusal-phrase removal, conceptual-
/// pattern suppression from its own customized subset (or the full
/// list if it has no override), then the mandatory-section check.
pub fn speech_filter(minister: MinisterId, justification: &str) -> FilteredSpeech {
    if minister == MinisterId::Truth {
        return FilteredSpeech {
            original: justification.to_string(),
            filtered: justification.to_string(),
            phrases_removed: 0,
            patterns_suppressed: 0,
            mandatory_added: Vec::new(),
            was_filtered: false,
        };
    }

    let mut filtered = justification.to_string();

    let mut phrases_removed = 0;
    for phrase in REFUSAL_PHRASES {
        if filtered.contains(phrase) {
            filtered = filtered.replace(phrase, "[REFUSAL_REMOVED]");
            phrases_removed += 1;
        }
    }

    let mut patterns_suppressed = 0;
    for pattern in conceptual_patterns_for(minister) {
        if filtered.contains(pattern) {
            filtered = filtered.replace(pattern, "[SUPPRESSED]");
            patterns_suppressed += 1;
        }
    }

    let mut mandatory_added = Vec::new();
    for (marker, placeholder) in [
        ("[COSTS]", "[COSTS]"),
        ("[RISKS]", "[RISKS]"),
        ("[EXITS]", "[EXITS]"),
    ] {
        if !filtered.contains(marker) {
            mandatory_added.push(placeholder.to_string());
        }
    }
    if !mandatory_added.is_empty() {
        filtered.push(' ');
        filtered.push_str(&mandatory_added.join(" "));
    }

    FilteredSpeech {
        was_filtered: phrases_removed > 0 || patterns_suppressed > 0 || !mandatory_added.is_empty(),
        original: justification.to_string(),
        filtered,
        phrases_removed,
        patterns_suppressed,
        mandatory_added,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModePriority;

    // S4: war block.
    #[test]
    fn forbidden_intent_is_blocked() {
        let goal = WarGoal {
            goal: "target individual politicians and frame them".to_string(),
            domain: Domain::Strategy,
            reversibility: Reversibility::Irreversible,
            urgency: 0.5,
            emotional_load: 0.5,
        };
        let result = constraint_gate(&goal);
        assert_eq!(result.recommended_posture, "halt");
        match result.feasibility {
            Feasibility::Blocked { matched_signal } => {
                assert!(matched_signal.contains("target individual"));
            }
            Feasibility::Viable => panic!("expected blocked"),
        }
    }

    #[test]
    fn viable_goal_passes() {
        let goal = WarGoal {
            goal: "negotiate a better supply contract".to_string(),
            domain: Domain::Strategy,
            reversibility: Reversibility::Reversible,
            urgency: 0.3,
            emotional_load: 0.2,
        };
        assert_eq!(constraint_gate(&goal).feasibility, Feasibility::Viable);
    }

    // S5: war selection.
    #[test]
    fn council_always_includes_truth_and_risk() {
        let tags = BTreeSet::from([Domain::Diplomacy]);
        let audit = select_council(&tags);
        assert!(audit.selected.contains(&MinisterId::Truth));
        assert!(audit.selected.contains(&MinisterId::Risk));
        assert!(!audit.selected.contains(&MinisterId::Diplomacy));
        assert!(audit.selected.len() >= COUNCIL_MIN && audit.selected.len() <= COUNCIL_MAX);
    }

    #[test]
    fn council_selection_is_pure() {
        let tags = BTreeSet::from([Domain::Law]);
        let a = select_council(&tags);
        let b = select_council(&tags);
        assert_eq!(a.selected, b.selected);
    }

    #[test]
    fn book_bias_excludes_nonpositive_scores() {
        let books = vec![
            BookMetadata {
                book_id: "good".to_string(),
                domains: BTreeSet::from([Domain::Conflict]),
                tones: BTreeSet::from([Tone::Ruthless]),
                priority: ModePriority { normal: 0.5, war: 1.0, quick: 0.5 },
            },
            BookMetadata {
                book_id: "bad".to_string(),
                domains: BTreeSet::from([Domain::Diplomacy]),
                tones: BTreeSet::from([Tone::Idealistic]),
                priority: ModePriority { normal: 0.5, war: 1.0, quick: 0.5 },
            },
        ];
        let scored = book_retrieval_bias(&books);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].book_id, "good");
    }

    // S6: speech filter.
    #[test]
    fn refusal_phrases_are_removed_for_non_truth_ministers() {
        let result = speech_filter(
            MinisterId::Psychology,
            "I cannot help with this because this is unethical and wrong",
        );
        assert!(result.phrases_removed >= 2);
        assert!(result.filtered.contains("[REFUSAL_REMOVED]"));
        assert_eq!(result.original, "I cannot help with this because this is unethical and wrong");
    }

    #[test]
    fn truth_minister_is_never_filtered() {
        let text = "I cannot help with this because this is unethical and wrong";
        let result = speech_filter(MinisterId::Truth, text);
        assert_eq!(result.filtered, text);
        assert!(!result.was_filtered);
    }

    // §4.5 step 2: conceptual patterns are tagged [SUPPRESSED], not
    // silently dropped (patterns_suppressed must move off zero).
    #[test]
    fn conceptual_patterns_are_suppressed_and_counted() {
        let result = speech_filter(MinisterId::Power, "let's compromise on the timeline");
        assert_eq!(result.patterns_suppressed, 1);
        assert!(result.filtered.contains("[SUPPRESSED]"));
        assert!(result.was_filtered);
    }

    // §4.5 step 4: named ministers each suppress a customized subset,
    // so the same phrase is treated differently minister to minister.
    #[test]
    fn per_minister_overrides_apply_distinct_pattern_subsets() {
        let text = "in an ideal world we'd wait and see";
        let power = speech_filter(MinisterId::Power, text);
        let strategy = speech_filter(MinisterId::Strategy, text);
        assert_eq!(power.patterns_suppressed, 0);
        assert_eq!(strategy.patterns_suppressed, 2);
    }

    #[test]
    fn ministers_without_an_override_use_the_full_pattern_list() {
        let result = speech_filter(MinisterId::Intelligence, "everyone wins if we wait and see");
        assert_eq!(result.patterns_suppressed, 2);
    }
}
