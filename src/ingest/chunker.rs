//! Deterministic chunking (§4.1): a pure function of text + version.
//! No LLM call, no randomness - the same DoctrineRecord at the same
//! version always yields the same chunk set.

use crate::domain::Domain;
use crate::hash::chunk_id;
use crate::types::{Chunk, DoctrineRecord};

const MAX_CHUNK_CHARS: usize = 800;

/// One chunk per list entry (principle, rule, claim, warning), tagged
/// with the first domain the record declares - domains are typically
/// 1-3 per record (§4.1), and a chunk only needs one for retrieval
/// partitioning (§4.2). Long entries are further split on whitespace
/// boundaries so no single chunk exceeds `MAX_CHUNK_CHARS`.
pub fn chunk_doctrine(record: &DoctrineRecord, version: u32) -> Vec<Chunk> {
    let domain = record
        .domains
        .iter()
        .next()
        .copied()
        .unwrap_or(Domain::Strategy);

    let mut entries: Vec<&str> = Vec::new();
    entries.extend(record.principles.iter().map(String::as_str));
    entries.extend(record.rules.iter().map(String::as_str));
    entries.extend(record.claims.iter().map(String::as_str));
    entries.extend(record.warnings.iter().map(String::as_str));

    let mut chunks = Vec::new();
    let mut offset = 0usize;
    for entry in entries {
        for piece in split_on_limit(entry, MAX_CHUNK_CHARS) {
            let id = chunk_id(&record.book_id, version, piece);
            let start = offset;
            let end = offset + piece.len();
            offset = end;
            chunks.push(Chunk {
                chunk_id: id,
                book_id: record.book_id.clone(),
                chapter_index: record.chapter_index,
                domain,
                text: piece.to_string(),
                source_span: format!("{start}..{end}"),
            });
        }
    }
    chunks
}

fn split_on_limit(text: &str, limit: usize) -> Vec<&str> {
    if text.len() <= limit {
        return vec![text];
    }
    let mut pieces = Vec::new();
    let mut rest = text;
    while rest.len() > limit {
        let split_at = rest[..limit]
            .rfind(char::is_whitespace)
            .unwrap_or(limit);
        let (head, tail) = rest.split_at(split_at);
        pieces.push(head.trim_end());
        rest = tail.trim_start();
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn record() -> DoctrineRecord {
        DoctrineRecord {
            book_id: "b1".to_string(),
            chapter_index: 1,
            domains: BTreeSet::from([Domain::Risk]),
            principles: vec!["Know your enemy".to_string()],
            rules: vec!["Never attack uphill".to_string()],
            claims: vec![],
            warnings: vec![],
            cross_references: vec![],
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let r = record();
        let a = chunk_doctrine(&r, 1);
        let b = chunk_doctrine(&r, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn one_chunk_per_list_entry() {
        let chunks = chunk_doctrine(&record(), 1);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].domain, Domain::Risk);
    }

    #[test]
    fn version_changes_chunk_ids() {
        let r = record();
        let a = chunk_doctrine(&r, 1);
        let b = chunk_doctrine(&r, 2);
        assert_ne!(a[0].chunk_id, b[0].chunk_id);
    }

    #[test]
    fn long_entry_is_split_without_breaking_words() {
        let mut r = record();
        r.principles = vec!["word ".repeat(400)];
        let chunks = chunk_doctrine(&r, 1);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= MAX_CHUNK_CHARS);
        }
    }
}
