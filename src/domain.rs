//! The closed 15-tag domain enumeration (§3) and the book-tone
//! enumeration used for war-mode book bias (§4.5).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed enumeration of doctrine domains. No other tags are
/// accepted anywhere in the pipeline - phase-2 validation (§4.1) and
/// minister bindings (§4.3) both reject anything outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Strategy,
    Power,
    Conflict,
    Deception,
    Psychology,
    Leadership,
    Organization,
    Intelligence,
    Timing,
    Risk,
    Resources,
    Law,
    Morality,
    Diplomacy,
    Adaptation,
}

impl Domain {
    pub const ALL: [Domain; 15] = [
        Domain::Strategy,
        Domain::Power,
        Domain::Conflict,
        Domain::Deception,
        Domain::Psychology,
        Domain::Leadership,
        Domain::Organization,
        Domain::Intelligence,
        Domain::Timing,
        Domain::Risk,
        Domain::Resources,
        Domain::Law,
        Domain::Morality,
        Domain::Diplomacy,
        Domain::Adaptation,
    ];

    /// Parse from a free-text tag, case-insensitively. Used by phase-2
    /// validation (§4.1) and the book-metadata loader (§4.2).
    pub fn parse(tag: &str) -> Option<Domain> {
        let lower = tag.trim().to_lowercase();
        Self::ALL.into_iter().find(|d| d.as_str() == lower)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Strategy => "strategy",
            Domain::Power => "power",
            Domain::Conflict => "conflict",
            Domain::Deception => "deception",
            Domain::Psychology => "psychology",
            Domain::Leadership => "leadership",
            Domain::Organization => "organization",
            Domain::Intelligence => "intelligence",
            Domain::Timing => "timing",
            Domain::Risk => "risk",
            Domain::Resources => "resources",
            Domain::Law => "law",
            Domain::Morality => "morality",
            Domain::Diplomacy => "diplomacy",
            Domain::Adaptation => "adaptation",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tone tags used to bias war-mode book selection (§4.5). Not part of
/// spec.md's closed Domain enum; this is a smaller open-ended-in-the-
/// original, closed-here set inferred from the book-bias formula's
/// "preferred_tones"/"deprioritized_tones" terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Ruthless,
    Pragmatic,
    Patient,
    Aggressive,
    Cautious,
    Idealistic,
}

impl Tone {
    pub const ALL: [Tone; 6] = [
        Tone::Ruthless,
        Tone::Pragmatic,
        Tone::Patient,
        Tone::Aggressive,
        Tone::Cautious,
        Tone::Idealistic,
    ];

    pub fn parse(tag: &str) -> Option<Tone> {
        let lower = tag.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == lower)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Ruthless => "ruthless",
            Tone::Pragmatic => "pragmatic",
            Tone::Patient => "patient",
            Tone::Aggressive => "aggressive",
            Tone::Cautious => "cautious",
            Tone::Idealistic => "idealistic",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_domains_round_trip_through_parse() {
        for d in Domain::ALL {
            assert_eq!(Domain::parse(d.as_str()), Some(d));
        }
    }

    #[test]
    fn unknown_domain_tag_rejected() {
        assert_eq!(Domain::parse("astrology"), None);
    }

    #[test]
    fn domain_parse_is_case_insensitive() {
        assert_eq!(Domain::parse("STRATEGY"), Some(Domain::Strategy));
    }
}
