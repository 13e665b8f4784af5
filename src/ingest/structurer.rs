//! Phase-1 structuring (§4.1): book text -> `ChapterRecord[]`, asked of
//! the LLM under a strict schema and validated before any commit.

use crate::error::ValidationError;
use crate::llm::Llm;
use crate::types::{BookStructure, ChapterRecord};
use anyhow::{Context, Result};
use std::path::Path;

const SCHEMA_HINT: &str = r#"Return JSON: {"book_title": str, "author": str|null, "chapters": [{"chapter_index": int, "chapter_title": str, "chapter_text": str}]}. chapter_index must be dense 1..N with no gaps or repeats."#;

pub async fn structure_book(
    llm: &dyn Llm,
    book_id: &str,
    book_text: &str,
) -> Result<BookStructure> {
    let prompt = format!(
        "Split the following book into chapters with titles and full text.\n\n{book_text}"
    );
    let raw = llm
        .complete_json(&prompt, SCHEMA_HINT)
        .await
        .context("phase-1 structuring call failed")?;

    let structure: BookStructure =
        serde_json::from_value(raw).map_err(|e| ValidationError::SchemaMismatch(e.to_string()))?;

    validate_structure(book_id, &structure)?;
    Ok(structure)
}

/// §8 invariant 1: chapter_index forms the dense set 1..N.
pub fn validate_structure(book_id: &str, structure: &BookStructure) -> Result<(), ValidationError> {
    if structure.chapters.is_empty() {
        return Err(ValidationError::EmptyChapterList);
    }

    let mut indices: Vec<u32> = structure.chapters.iter().map(|c| c.chapter_index).collect();
    indices.sort_unstable();
    let expected: Vec<u32> = (1..=indices.len() as u32).collect();
    if indices != expected {
        return Err(ValidationError::NonDenseChapterIndices(format!(
            "book {book_id}: got {indices:?}, expected {expected:?}"
        )));
    }

    for chapter in &structure.chapters {
        if chapter.title.trim().is_empty() {
            return Err(ValidationError::EmptyChapterTitle(chapter.chapter_index));
        }
        if chapter.text.trim().is_empty() {
            return Err(ValidationError::EmptyChapterText(chapter.chapter_index));
        }
    }

    Ok(())
}

/// Durable commit point for phase-1: write-temp-then-rename (§4.1, §8
/// "atomic per-commit").
pub fn commit_structure(book_dir: &Path, structure: &BookStructure) -> Result<()> {
    std::fs::create_dir_all(book_dir)?;
    let final_path = book_dir.join("structure.json");
    let tmp_path = book_dir.join("structure.json.tmp");

    let json = serde_json::to_string_pretty(structure)?;
    std::fs::write(&tmp_path, json)
        .with_context(|| format!("failed to write {tmp_path:?}"))?;
    std::fs::rename(&tmp_path, &final_path)
        .with_context(|| format!("failed to commit {final_path:?}"))?;
    Ok(())
}

pub fn load_structure(book_dir: &Path) -> Result<Option<BookStructure>> {
    let path = book_dir.join("structure.json");
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

pub fn chapter_records(book_id: &str, structure: &BookStructure) -> Vec<ChapterRecord> {
    structure
        .chapters
        .iter()
        .map(|c| ChapterRecord {
            book_id: book_id.to_string(),
            chapter_index: c.chapter_index,
            title: c.title.clone(),
            text: c.text.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn structure(indices: &[u32]) -> BookStructure {
        BookStructure {
            book_title: "Test".to_string(),
            author: None,
            chapters: indices
                .iter()
                .map(|&i| ChapterRecord {
                    book_id: "b1".to_string(),
                    chapter_index: i,
                    title: format!("Chapter {i}"),
                    text: format!("text {i}"),
                })
                .collect(),
        }
    }

    #[test]
    fn dense_indices_pass_validation() {
        assert!(validate_structure("b1", &structure(&[1, 2, 3])).is_ok());
    }

    #[test]
    fn gap_in_indices_is_rejected() {
        let err = validate_structure("b1", &structure(&[1, 3])).unwrap_err();
        assert!(matches!(err, ValidationError::NonDenseChapterIndices(_)));
    }

    #[test]
    fn empty_chapter_list_is_rejected() {
        let mut s = structure(&[1]);
        s.chapters.clear();
        assert!(matches!(
            validate_structure("b1", &s),
            Err(ValidationError::EmptyChapterList)
        ));
    }

    #[tokio::test]
    async fn structure_book_validates_llm_output() {
        let payload = serde_json::json!({
            "book_title": "Test",
            "author": null,
            "chapters": [
                {"chapter_index": 1, "chapter_title": "One", "chapter_text": "x"},
            ],
        });
        let llm = MockLlm::new(vec![payload]);
        let result = structure_book(&llm, "b1", "raw text").await.unwrap();
        assert_eq!(result.chapters.len(), 1);
    }

    #[tokio::test]
    async fn structure_book_rejects_malformed_schema() {
        let llm = MockLlm::new(vec![serde_json::json!({"nope": true})]);
        assert!(structure_book(&llm, "b1", "raw text").await.is_err());
    }

    #[test]
    fn commit_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let s = structure(&[1, 2]);
        commit_structure(dir.path(), &s).unwrap();
        let loaded = load_structure(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.chapters.len(), 2);
    }
}
