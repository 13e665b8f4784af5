//! Core data model (§3).
//!
//! Lifecycles: `ChapterRecord`, `DoctrineRecord`, `Chunk`, and
//! `EmbeddedChunk` are created once and never mutated. `DecisionEvent`
//! is appended once and never modified. `Outcome` is appended once, at
//! most one per event. `Pattern` and `Calibration` are derived and may
//! be rebuilt from the ledger at any time.

use crate::domain::{Domain, Tone};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub type BookId = String;
pub type ChapterIndex = u32;
pub type ChunkId = String;

/// One chapter of a book, produced by the phase-1 structurer (§4.1).
/// Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterRecord {
    pub book_id: BookId,
    pub chapter_index: ChapterIndex,
    pub title: String,
    pub text: String,
}

/// The full phase-1 commit for a book - `structure.json` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookStructure {
    pub book_title: String,
    #[serde(default)]
    pub author: Option<String>,
    pub chapters: Vec<ChapterRecord>,
}

/// A doctrine extraction for one chapter, produced by the phase-2
/// extractor (§4.1). Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoctrineRecord {
    pub book_id: BookId,
    pub chapter_index: ChapterIndex,
    pub domains: BTreeSet<Domain>,
    pub principles: Vec<String>,
    pub rules: Vec<String>,
    pub claims: Vec<String>,
    pub warnings: Vec<String>,
    pub cross_references: Vec<ChapterIndex>,
}

/// A chunk of doctrine text ready for embedding (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub book_id: BookId,
    pub chapter_index: ChapterIndex,
    pub domain: Domain,
    pub text: String,
    pub source_span: String,
}

/// A chunk plus its embedding vector, as stored in a per-domain index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Per-mode retrieval priority for a book (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModePriority {
    pub normal: f64,
    pub war: f64,
    pub quick: f64,
}

impl Default for ModePriority {
    fn default() -> Self {
        Self {
            normal: 0.5,
            war: 0.5,
            quick: 0.5,
        }
    }
}

/// Book-level metadata consulted by the registry and war-mode bias (§4.2, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMetadata {
    pub book_id: BookId,
    #[serde(default)]
    pub domains: BTreeSet<Domain>,
    #[serde(default)]
    pub tones: BTreeSet<Tone>,
    #[serde(default)]
    pub priority: ModePriority,
}

impl BookMetadata {
    /// The default returned for an unknown book (§4.2): empty
    /// domain/tone sets, priorities of 0.5.
    pub fn unknown(book_id: &str) -> Self {
        Self {
            book_id: book_id.to_string(),
            domains: BTreeSet::new(),
            tones: BTreeSet::new(),
            priority: ModePriority::default(),
        }
    }
}

/// The closed enumeration of 15 minister identities (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinisterId {
    Power,
    Psychology,
    Conflict,
    Intelligence,
    Narrative,
    Timing,
    Optionality,
    Truth,
    Risk,
    Legitimacy,
    Technology,
    Data,
    Operations,
    Diplomacy,
    Strategy,
}

impl MinisterId {
    pub const ALL: [MinisterId; 15] = [
        MinisterId::Power,
        MinisterId::Psychology,
        MinisterId::Conflict,
        MinisterId::Intelligence,
        MinisterId::Narrative,
        MinisterId::Timing,
        MinisterId::Optionality,
        MinisterId::Truth,
        MinisterId::Risk,
        MinisterId::Legitimacy,
        MinisterId::Technology,
        MinisterId::Data,
        MinisterId::Operations,
        MinisterId::Diplomacy,
        MinisterId::Strategy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MinisterId::Power => "power",
            MinisterId::Psychology => "psychology",
            MinisterId::Conflict => "conflict",
            MinisterId::Intelligence => "intelligence",
            MinisterId::Narrative => "narrative",
            MinisterId::Timing => "timing",
            MinisterId::Optionality => "optionality",
            MinisterId::Truth => "truth",
            MinisterId::Risk => "risk",
            MinisterId::Legitimacy => "legitimacy",
            MinisterId::Technology => "technology",
            MinisterId::Data => "data",
            MinisterId::Operations => "operations",
            MinisterId::Diplomacy => "diplomacy",
            MinisterId::Strategy => "strategy",
        }
    }
}

impl std::fmt::Display for MinisterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A minister's allowed domains/books (§3). Immutable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinisterBinding {
    pub minister: MinisterId,
    pub allowed_domains: BTreeSet<Domain>,
    pub allowed_books: AllowedBooks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedBooks {
    All,
    Only(BTreeSet<BookId>),
}

impl AllowedBooks {
    pub fn permits(&self, book_id: &str) -> bool {
        match self {
            AllowedBooks::All => true,
            AllowedBooks::Only(set) => set.contains(book_id),
        }
    }
}

/// The stance a minister position takes (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Advance,
    Delay,
    Avoid,
    Conditional,
    NeedsData,
    Abstain,
    Stop,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Advance => "ADVANCE",
            Stance::Delay => "DELAY",
            Stance::Avoid => "AVOID",
            Stance::Conditional => "CONDITIONAL",
            Stance::NeedsData => "NEEDS_DATA",
            Stance::Abstain => "ABSTAIN",
            Stance::Stop => "STOP",
        }
    }
}

/// A minister's position in the debate (§3). `unique_doctrine_count`,
/// the confidence cap, and the STOP-on-violations rule are invariants
/// enforced by `MinisterPosition::new`, never by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinisterPosition {
    pub minister: MinisterId,
    pub stance: Stance,
    pub justification: String,
    pub doctrine_ids: Vec<ChunkId>,
    pub unique_doctrine_count: usize,
    pub violations: Vec<String>,
    pub confidence: f64,
    pub constraints: Vec<String>,
}

impl MinisterPosition {
    /// Construct a position enforcing the invariants from §3:
    /// - `unique_doctrine_count == |set(doctrine_ids)|`
    /// - `confidence <= 0.6` if `unique_doctrine_count < 2`
    /// - non-empty `violations` forces `stance = STOP`
    pub fn new(
        minister: MinisterId,
        mut stance: Stance,
        justification: String,
        doctrine_ids: Vec<ChunkId>,
        violations: Vec<String>,
        mut confidence: f64,
        mut constraints: Vec<String>,
    ) -> Self {
        let unique: std::collections::BTreeSet<&ChunkId> = doctrine_ids.iter().collect();
        let unique_doctrine_count = unique.len();

        if unique_doctrine_count < 2 {
            confidence = confidence.min(0.6);
        }

        if !violations.is_empty() {
            stance = Stance::Stop;
            if !constraints.iter().any(|c| c == "factual inconsistencies detected") {
                constraints.push("factual inconsistencies detected".to_string());
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        let deduped_ids: Vec<ChunkId> = doctrine_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        Self {
            minister,
            stance,
            justification,
            doctrine_ids: deduped_ids,
            unique_doctrine_count,
            violations,
            confidence: confidence.clamp(0.0, 1.0),
            constraints,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    StanceConflict,
    VetoConflict,
    FactualUncertainty,
    IrreversibilityConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictEvent {
    pub kind: ConflictKind,
    pub severity: Severity,
    pub parties: Vec<MinisterId>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TribunalDecision {
    AllowWithConstraints,
    DelayPendingData,
    Escalate,
    Abort,
    Silence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TribunalVerdict {
    pub decision: TribunalDecision,
    pub constraints: Vec<String>,
    pub required_data: Vec<String>,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateProceedings {
    pub positions: Vec<MinisterPosition>,
    pub conflicts: Vec<ConflictEvent>,
    pub tribunal_verdict: Option<TribunalVerdict>,
    pub final_verdict: String,
    /// Ministers whose post-synthesis confidence fell below
    /// `debate::LOW_CONFIDENCE_THRESHOLD` (§8 invariant 15): their
    /// advice is still recorded but must not be presented as
    /// authoritative.
    pub flagged_low_confidence: Vec<MinisterId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reversibility {
    Reversible,
    PartiallyReversible,
    Irreversible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Quick,
    Normal,
    War,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Quick => "quick",
            Mode::Normal => "normal",
            Mode::War => "war",
        }
    }
}

/// An append-only ledger row recording a counseled decision (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub domain: Domain,
    pub stakes: Option<String>,
    pub emotional_load: f64,
    pub urgency: f64,
    pub ministers_called: Vec<MinisterId>,
    pub verdict_summary: String,
    pub posture: String,
    pub illusions_detected: Vec<String>,
    pub contradictions_found: u32,
    pub mode: Mode,
    pub sovereign_action: Option<String>,
    pub action_followed_counsel: Option<bool>,
    pub override_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    Success,
    Partial,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub event_id: Uuid,
    pub resolved_at: DateTime<Utc>,
    pub result: OutcomeResult,
    pub damage: f64,
    pub benefit: f64,
    pub lessons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRow {
    pub event_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    RepetitionLoop,
    OverrideLoop,
    EmotionalLoop,
    OutcomePattern,
    WarEscalationBias,
    WarFalseUrgencyLoop,
    WarRepeatedOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_id: String,
    pub kind: PatternKind,
    pub description: String,
    pub domain: Option<Domain>,
    pub frequency: u32,
    pub last_seen: DateTime<Utc>,
    pub last_outcome: Option<OutcomeResult>,
}

/// Per-minister-or-"n", per-domain confidence/posture calibration (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    /// `"n"` for the sovereign posture, or a `MinisterId::as_str()`.
    pub subject: String,
    pub domain: Option<Domain>,
    pub confidence: f64,
    pub caution: f64,
    pub urgency_threshold: f64,
    pub bluntness: f64,
    pub updated_at: DateTime<Utc>,
}

impl Calibration {
    pub fn baseline(subject: &str, domain: Option<Domain>) -> Self {
        Self {
            subject: subject.to_string(),
            domain,
            confidence: 0.50,
            caution: 1.0,
            urgency_threshold: 1.0,
            bluntness: 1.0,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_doctrine_count_matches_set_size() {
        let pos = MinisterPosition::new(
            MinisterId::Risk,
            Stance::Advance,
            "j".into(),
            vec!["a".into(), "a".into(), "b".into()],
            vec![],
            0.9,
            vec![],
        );
        assert_eq!(pos.unique_doctrine_count, 2);
        assert_eq!(pos.doctrine_ids.len(), 2);
    }

    #[test]
    fn low_doctrine_count_caps_confidence() {
        let pos = MinisterPosition::new(
            MinisterId::Risk,
            Stance::Advance,
            "j".into(),
            vec!["a".into()],
            vec![],
            0.95,
            vec![],
        );
        assert!(pos.confidence <= 0.6);
    }

    #[test]
    fn violations_force_stop() {
        let pos = MinisterPosition::new(
            MinisterId::Truth,
            Stance::Advance,
            "j".into(),
            vec!["a".into(), "b".into()],
            vec!["inconsistent claim".into()],
            0.9,
            vec![],
        );
        assert_eq!(pos.stance, Stance::Stop);
        assert!(pos
            .constraints
            .iter()
            .any(|c| c == "factual inconsistencies detected"));
    }

    // §8 universal invariants 8 & 9, as property tests over arbitrary
    // doctrine-id lists and confidences rather than fixed examples.
    proptest::proptest! {
        #[test]
        fn prop_unique_doctrine_count_always_matches_set_size(
            ids in proptest::collection::vec("[a-c]", 0..6),
            confidence in 0.0f64..=1.0,
        ) {
            let pos = MinisterPosition::new(
                MinisterId::Risk,
                Stance::Advance,
                "j".into(),
                ids,
                vec![],
                confidence,
                vec![],
            );
            let set: std::collections::BTreeSet<&ChunkId> = pos.doctrine_ids.iter().collect();
            proptest::prop_assert_eq!(pos.unique_doctrine_count, set.len());
            if pos.unique_doctrine_count < 2 {
                proptest::prop_assert!(pos.confidence <= 0.6);
            }
        }

        #[test]
        fn prop_nonempty_violations_always_force_stop(
            violations in proptest::collection::vec("[a-z ]{1,10}", 1..4),
            stance_seed in 0u8..7,
        ) {
            let stance = match stance_seed {
                0 => Stance::Advance,
                1 => Stance::Delay,
                2 => Stance::Avoid,
                3 => Stance::Conditional,
                4 => Stance::NeedsData,
                5 => Stance::Abstain,
                _ => Stance::Stop,
            };
            let pos = MinisterPosition::new(
                MinisterId::Truth,
                stance,
                "j".into(),
                vec!["a".into(), "b".into()],
                violations,
                0.9,
                vec![],
            );
            proptest::prop_assert_eq!(pos.stance, Stance::Stop);
        }
    }
}
