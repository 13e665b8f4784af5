//! Grounded synthesis (§4.3): one LLM call per minister against a
//! strict output schema, followed by deterministic, language-
//! independent post-processing. The LLM never gets the final word -
//! every rule here runs after the model responds.

use crate::error::ValidationError;
use crate::llm::Llm;
use crate::retriever::{RetrievedHit, RetrievedSet};
use crate::types::{ChunkId, MinisterId, MinisterPosition, Stance};
use anyhow::{Context, Result};

const SCHEMA_HINT: &str = r#"Return JSON: {"stance": "advance"|"delay"|"avoid"|"conditional"|"needs_data"|"abstain"|"stop", "justification": str, "doctrine_ids": [str], "violations": [str], "constraints": [str], "confidence": float}. Never use narrative phrases like "I believe", "respectfully", or "honored members" - justify from doctrine only."#;

/// Phrases stripped from `justification` regardless of minister (§4.3).
const NARRATIVE_PHRASES: &[&str] = &[
    "I believe",
    "respectfully",
    "honored members",
    "in my opinion",
    "if I may",
];

fn build_prompt(minister: MinisterId, query: &str, hits: &[RetrievedHit]) -> String {
    let mut doctrine = String::new();
    for hit in hits {
        doctrine.push_str(&format!("[{}] {}\n", hit.hit.chunk_id, hit.hit.payload.text));
    }
    format!(
        "Minister: {minister}\nQuery: {query}\n\nAvailable doctrine:\n{doctrine}"
    )
}

fn sanitize_narrative(text: &str) -> String {
    let mut out = text.to_string();
    for phrase in NARRATIVE_PHRASES {
        out = out.replace(phrase, "").replace(&phrase.to_lowercase(), "");
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(serde::Deserialize)]
struct RawSynthesis {
    stance: String,
    justification: String,
    doctrine_ids: Vec<String>,
    #[serde(default)]
    violations: Vec<String>,
    #[serde(default)]
    constraints: Vec<String>,
    confidence: f64,
}

fn parse_stance(raw: &str) -> Result<Stance, ValidationError> {
    match raw {
        "advance" => Ok(Stance::Advance),
        "delay" => Ok(Stance::Delay),
        "avoid" => Ok(Stance::Avoid),
        "conditional" => Ok(Stance::Conditional),
        "needs_data" => Ok(Stance::NeedsData),
        "abstain" => Ok(Stance::Abstain),
        "stop" => Ok(Stance::Stop),
        other => Err(ValidationError::SchemaMismatch(format!(
            "unknown stance '{other}'"
        ))),
    }
}

/// One minister's synthesized position (§4.3). Always returns a
/// position - an empty retrieval or LLM violations still produce a
/// `MinisterPosition`, never an error, because the debate engine
/// always produces a verdict (§7).
pub async fn synthesize(
    llm: &dyn Llm,
    minister: MinisterId,
    query: &str,
    retrieved: &RetrievedSet,
) -> Result<MinisterPosition> {
    let hits = match retrieved {
        RetrievedSet::InsufficientKnowledge => {
            return Ok(MinisterPosition::new(
                minister,
                Stance::NeedsData,
                "no doctrine available for this domain".to_string(),
                Vec::new(),
                Vec::new(),
                0.0,
                Vec::new(),
            ));
        }
        RetrievedSet::Hits(hits) => hits,
    };

    let prompt = build_prompt(minister, query, hits);
    let raw = llm
        .complete_json(&prompt, SCHEMA_HINT)
        .await
        .with_context(|| format!("synthesis call failed for minister {minister}"))?;

    let parsed: RawSynthesis =
        serde_json::from_value(raw).map_err(|e| ValidationError::SchemaMismatch(e.to_string()))?;
    let stance = parse_stance(&parsed.stance)?;

    let justification = sanitize_narrative(&parsed.justification);
    let doctrine_ids: Vec<ChunkId> = parsed.doctrine_ids;

    // §4.3: only the Truth minister may populate violations.
    let violations = if minister == MinisterId::Truth {
        parsed.violations
    } else {
        Vec::new()
    };

    Ok(MinisterPosition::new(
        minister,
        stance,
        justification,
        doctrine_ids,
        violations,
        parsed.confidence,
        parsed.constraints,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    #[test]
    fn sanitize_strips_narrative_phrases() {
        let out = sanitize_narrative("I believe, respectfully, this is sound doctrine");
        assert!(!out.to_lowercase().contains("i believe"));
        assert!(!out.to_lowercase().contains("respectfully"));
    }

    #[tokio::test]
    async fn empty_retrieval_forces_needs_data() {
        let llm = MockLlm::new(vec![]);
        let pos = synthesize(&llm, MinisterId::Risk, "q", &RetrievedSet::InsufficientKnowledge)
            .await
            .unwrap();
        assert_eq!(pos.stance, Stance::NeedsData);
        assert_eq!(pos.confidence, 0.0);
        assert_eq!(pos.justification, "no doctrine available for this domain");
    }

    #[tokio::test]
    async fn non_truth_minister_violations_are_dropped() {
        let llm = MockLlm::new(vec![serde_json::json!({
            "stance": "advance",
            "justification": "sound footing",
            "doctrine_ids": ["a", "b"],
            "violations": ["should never appear"],
            "constraints": [],
            "confidence": 0.8,
        })]);
        let hits = RetrievedSet::Hits(vec![]);
        let pos = synthesize(&llm, MinisterId::Power, "q", &hits).await.unwrap();
        assert!(pos.violations.is_empty());
        assert_eq!(pos.stance, Stance::Advance);
    }

    #[tokio::test]
    async fn truth_minister_violations_force_stop() {
        let llm = MockLlm::new(vec![serde_json::json!({
            "stance": "advance",
            "justification": "doctrine conflicts",
            "doctrine_ids": ["a", "b"],
            "violations": ["contradicts chapter 3"],
            "constraints": [],
            "confidence": 0.8,
        })]);
        let hits = RetrievedSet::Hits(vec![]);
        let pos = synthesize(&llm, MinisterId::Truth, "q", &hits).await.unwrap();
        assert_eq!(pos.stance, Stance::Stop);
        assert!(pos.constraints.iter().any(|c| c == "factual inconsistencies detected"));
    }

    #[tokio::test]
    async fn low_unique_doctrine_count_caps_confidence() {
        let llm = MockLlm::new(vec![serde_json::json!({
            "stance": "advance",
            "justification": "ok",
            "doctrine_ids": ["a"],
            "violations": [],
            "constraints": [],
            "confidence": 0.95,
        })]);
        let hits = RetrievedSet::Hits(vec![]);
        let pos = synthesize(&llm, MinisterId::Power, "q", &hits).await.unwrap();
        assert!(pos.confidence <= 0.6);
    }
}
