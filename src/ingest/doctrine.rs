//! Phase-2 doctrine extraction (§4.1): per chapter, independently, ask
//! the LLM for a `DoctrineRecord` constrained to the 15-domain enum.

use crate::domain::Domain;
use crate::error::ValidationError;
use crate::llm::Llm;
use crate::types::{ChapterRecord, DoctrineRecord};
use anyhow::{Context, Result};
use std::path::Path;

const SCHEMA_HINT: &str = r#"Return JSON: {"domains": [str], "principles": [str], "rules": [str], "claims": [str], "warnings": [str], "cross_references": [int]}. domains must be 1-3 values from the closed enumeration."#;

pub async fn extract_doctrine(
    llm: &dyn Llm,
    book_id: &str,
    chapter: &ChapterRecord,
    chapter_count: u32,
) -> Result<DoctrineRecord> {
    let prompt = format!(
        "Extract doctrine from chapter {} (\"{}\"):\n\n{}",
        chapter.chapter_index, chapter.title, chapter.text
    );
    let raw = llm
        .complete_json(&prompt, SCHEMA_HINT)
        .await
        .with_context(|| format!("phase-2 extraction call failed for chapter {}", chapter.chapter_index))?;

    let parsed: RawDoctrine =
        serde_json::from_value(raw).map_err(|e| ValidationError::SchemaMismatch(e.to_string()))?;

    let record = DoctrineRecord {
        book_id: book_id.to_string(),
        chapter_index: chapter.chapter_index,
        domains: parsed.domains.iter().filter_map(|d| Domain::parse(d)).collect(),
        principles: parsed.principles,
        rules: parsed.rules,
        claims: parsed.claims,
        warnings: parsed.warnings,
        cross_references: parsed.cross_references,
    };

    validate_doctrine(&record, chapter_count, &parsed.domains)?;
    Ok(record)
}

#[derive(serde::Deserialize)]
struct RawDoctrine {
    domains: Vec<String>,
    #[serde(default)]
    principles: Vec<String>,
    #[serde(default)]
    rules: Vec<String>,
    #[serde(default)]
    claims: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    cross_references: Vec<u32>,
}

/// §8 invariant 2: domains ⊆ enum, cross_references ⊆ {1..N_book}.
pub fn validate_doctrine(
    record: &DoctrineRecord,
    chapter_count: u32,
    raw_domain_tags: &[String],
) -> Result<(), ValidationError> {
    if record.domains.is_empty() {
        return Err(ValidationError::NoDomains(record.chapter_index));
    }
    if record.domains.len() > 3 {
        return Err(ValidationError::TooManyDomains(record.chapter_index));
    }
    for tag in raw_domain_tags {
        if Domain::parse(tag).is_none() {
            return Err(ValidationError::UnknownDomain(tag.clone()));
        }
    }

    for &reference in &record.cross_references {
        if reference == 0 || reference > chapter_count {
            return Err(ValidationError::DanglingCrossReference {
                chapter: record.chapter_index,
                reference,
            });
        }
    }

    for (field, values) in [
        ("principles", &record.principles),
        ("rules", &record.rules),
        ("claims", &record.claims),
        ("warnings", &record.warnings),
    ] {
        if values.iter().any(|v| v.trim().is_empty()) {
            return Err(ValidationError::EmptyListEntry {
                chapter: record.chapter_index,
                field,
            });
        }
    }

    Ok(())
}

/// Durable commit point for a chapter's phase-2 output: write-temp-
/// then-rename to `NN.json`, zero-padded (§6).
pub fn commit_doctrine(book_dir: &Path, record: &DoctrineRecord) -> Result<()> {
    std::fs::create_dir_all(book_dir)?;
    let name = format!("{:02}.json", record.chapter_index);
    let final_path = book_dir.join(&name);
    let tmp_path = book_dir.join(format!("{name}.tmp"));

    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(&tmp_path, json)
        .with_context(|| format!("failed to write {tmp_path:?}"))?;
    std::fs::rename(&tmp_path, &final_path)
        .with_context(|| format!("failed to commit {final_path:?}"))?;
    Ok(())
}

pub fn load_doctrine(book_dir: &Path, chapter_index: u32) -> Result<Option<DoctrineRecord>> {
    let path = book_dir.join(format!("{chapter_index:02}.json"));
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn chapter(index: u32) -> ChapterRecord {
        ChapterRecord {
            book_id: "b1".to_string(),
            chapter_index: index,
            title: format!("Chapter {index}"),
            text: "text".to_string(),
        }
    }

    #[tokio::test]
    async fn extract_doctrine_happy_path() {
        let llm = MockLlm::new(vec![serde_json::json!({
            "domains": ["strategy", "risk"],
            "principles": ["p1"],
            "rules": [],
            "claims": [],
            "warnings": [],
            "cross_references": [],
        })]);
        let record = extract_doctrine(&llm, "b1", &chapter(1), 3).await.unwrap();
        assert_eq!(record.domains.len(), 2);
    }

    #[tokio::test]
    async fn extract_doctrine_rejects_unknown_domain() {
        let llm = MockLlm::new(vec![serde_json::json!({
            "domains": ["astrology"],
            "principles": [],
            "rules": [],
            "claims": [],
            "warnings": [],
            "cross_references": [],
        })]);
        assert!(extract_doctrine(&llm, "b1", &chapter(1), 3).await.is_err());
    }

    #[tokio::test]
    async fn extract_doctrine_rejects_dangling_cross_reference() {
        let llm = MockLlm::new(vec![serde_json::json!({
            "domains": ["strategy"],
            "principles": [],
            "rules": [],
            "claims": [],
            "warnings": [],
            "cross_references": [99],
        })]);
        assert!(extract_doctrine(&llm, "b1", &chapter(1), 3).await.is_err());
    }

    #[test]
    fn commit_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let record = DoctrineRecord {
            book_id: "b1".to_string(),
            chapter_index: 1,
            domains: std::collections::BTreeSet::from([Domain::Strategy]),
            principles: vec![],
            rules: vec![],
            claims: vec![],
            warnings: vec![],
            cross_references: vec![],
        };
        commit_doctrine(dir.path(), &record).unwrap();
        let loaded = load_doctrine(dir.path(), 1).unwrap().unwrap();
        assert_eq!(loaded.book_id, "b1");
    }
}
