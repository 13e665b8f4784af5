//! Permissioned retrieval (§4.3): `retrieve_for_minister` enforces a
//! hard ACL - a minister never sees a chunk from a `(domain, book)` it
//! does not own, regardless of score.

use crate::embed::Embedder;
use crate::minister::MinisterRegistry;
use crate::types::{BookId, Mode, MinisterId};
use crate::vector_store::{SearchHit, VectorStore};
use anyhow::Result;
use std::collections::HashSet;

/// §4.3 step 6: below this many usable hits, the minister has nothing
/// to stand on.
pub const MIN_RESULTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Alignment {
    Support,
    Counter,
    Neutral,
}

#[derive(Debug, Clone)]
pub struct RetrievedHit {
    pub hit: SearchHit,
    pub alignment: Alignment,
}

#[derive(Debug, Clone)]
pub enum RetrievedSet {
    Hits(Vec<RetrievedHit>),
    InsufficientKnowledge,
}

const COUNTER_MARKERS: &[&str] = &["never", "avoid", "warning", "risk of", "do not"];
const SUPPORT_MARKERS: &[&str] = &["advance", "proceed", "recommend", "pursue", "confidence"];

/// §4.3 step 5: normal mode counts counter-aligned evidence at reduced
/// weight, war mode counts it in full.
const NORMAL_MODE_COUNTER_WEIGHT: f64 = 0.5;

/// Aligned/opposing/neutral partitioning is a heuristic over each
/// chunk's own text, since the corpus carries no explicit polarity
/// field: a chunk framed as a warning or constraint counters an
/// advancing query, a chunk echoing advancing language supports it,
/// anything else is neutral.
fn classify(text: &str) -> Alignment {
    let lower = text.to_lowercase();
    if COUNTER_MARKERS.iter().any(|m| lower.contains(m)) {
        Alignment::Counter
    } else if SUPPORT_MARKERS.iter().any(|m| lower.contains(m)) {
        Alignment::Support
    } else {
        Alignment::Neutral
    }
}

pub async fn retrieve_for_minister(
    registry: &MinisterRegistry,
    embedder: &dyn Embedder,
    store: &VectorStore,
    minister: MinisterId,
    query: &str,
    k: usize,
    mode: Mode,
    book_filter: Option<&HashSet<BookId>>,
) -> Result<RetrievedSet> {
    let binding = registry.binding(minister);
    let query_vec = embedder.embed(query).await?;

    let effective_filter: Option<HashSet<BookId>> = match (&binding.allowed_books, book_filter) {
        (crate::types::AllowedBooks::All, Some(requested)) => Some(requested.clone()),
        (crate::types::AllowedBooks::All, None) => None,
        (crate::types::AllowedBooks::Only(allowed), Some(requested)) => {
            Some(allowed.intersection(requested).cloned().collect())
        }
        (crate::types::AllowedBooks::Only(allowed), None) => Some(allowed.clone()),
    };

    let mut merged: Vec<SearchHit> = Vec::new();
    for &domain in &binding.allowed_domains {
        merged.extend(store.search(domain, &query_vec, k, effective_filter.as_ref()));
    }

    // Re-sort the merged multi-domain result by the same deterministic
    // ordering each per-domain search already used (§5).
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    merged.truncate(k);

    let classified: Vec<RetrievedHit> = merged
        .into_iter()
        .map(|hit| {
            let alignment = classify(&hit.payload.text);
            RetrievedHit { hit, alignment }
        })
        .collect();

    let usable: Vec<RetrievedHit> = match mode {
        Mode::Quick => classified
            .into_iter()
            .filter(|h| h.alignment == Alignment::Support)
            .collect(),
        Mode::Normal => {
            let mut weighted = classified;
            for hit in weighted.iter_mut() {
                if hit.alignment == Alignment::Counter {
                    hit.hit.score *= NORMAL_MODE_COUNTER_WEIGHT;
                }
            }
            weighted.sort_by(|a, b| {
                b.hit
                    .score
                    .partial_cmp(&a.hit.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.hit.chunk_id.cmp(&b.hit.chunk_id))
            });
            weighted
        }
        Mode::War => classified,
    };

    if usable.len() < MIN_RESULTS {
        return Ok(RetrievedSet::InsufficientKnowledge);
    }

    Ok(RetrievedSet::Hits(usable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use crate::embed::MockEmbedder;
    use crate::types::{Chunk, EmbeddedChunk};

    fn chunk(id: &str, book: &str, domain: Domain, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            book_id: book.to_string(),
            chapter_index: 1,
            domain,
            text: text.to_string(),
            source_span: "0..1".to_string(),
        }
    }

    // S3: ACL enforcement.
    #[tokio::test]
    async fn retrieval_never_crosses_the_acl() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        let embedder = MockEmbedder::new();

        for (id, domain, text) in [
            ("r1", Domain::Risk, "risk text one"),
            ("r2", Domain::Risk, "risk text two"),
            ("p1", Domain::Power, "power text"),
            ("y1", Domain::Psychology, "psychology text"),
        ] {
            let vector = embedder.embed(text).await.unwrap();
            store
                .upsert(domain, EmbeddedChunk { chunk: chunk(id, "b1", domain, text), vector })
                .unwrap();
        }

        let registry = MinisterRegistry::new();
        let query_vec = embedder.embed("risk text one").await.unwrap();
        let _ = query_vec;

        let result = retrieve_for_minister(
            &registry,
            &embedder,
            &store,
            MinisterId::Risk,
            "risk text one",
            5,
            Mode::Normal,
            None,
        )
        .await
        .unwrap();

        let hits = match result {
            RetrievedSet::Hits(h) => h,
            RetrievedSet::InsufficientKnowledge => panic!("expected hits"),
        };
        let allowed = registry.binding(MinisterId::Risk).allowed_domains.clone();
        for h in &hits {
            assert!(allowed.contains(&h.hit.payload.domain));
        }
    }

    #[tokio::test]
    async fn below_min_results_is_insufficient_knowledge() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        let embedder = MockEmbedder::new();
        let registry = MinisterRegistry::new();

        let result = retrieve_for_minister(
            &registry,
            &embedder,
            &store,
            MinisterId::Risk,
            "anything",
            5,
            Mode::Normal,
            None,
        )
        .await
        .unwrap();
        assert!(matches!(result, RetrievedSet::InsufficientKnowledge));
    }

    #[tokio::test]
    async fn quick_mode_only_uses_support() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        let embedder = MockEmbedder::new();
        let registry = MinisterRegistry::new();

        for (id, text) in [
            ("r1", "advance with confidence"),
            ("r2", "never attack without cover"),
            ("r3", "avoid this approach entirely"),
        ] {
            let vector = embedder.embed(text).await.unwrap();
            store
                .upsert(
                    Domain::Risk,
                    EmbeddedChunk { chunk: chunk(id, "b1", Domain::Risk, text), vector },
                )
                .unwrap();
        }

        let result = retrieve_for_minister(
            &registry,
            &embedder,
            &store,
            MinisterId::Risk,
            "advance with confidence",
            5,
            Mode::Quick,
            None,
        )
        .await
        .unwrap();

        match result {
            RetrievedSet::Hits(hits) => {
                assert!(hits.iter().all(|h| h.alignment == Alignment::Support));
            }
            RetrievedSet::InsufficientKnowledge => {}
        }
    }

    #[test]
    fn classify_has_a_neutral_category() {
        assert_eq!(classify("the quarterly report lists three options"), Alignment::Neutral);
        assert_eq!(classify("never attack without cover"), Alignment::Counter);
        assert_eq!(classify("proceed and advance with confidence"), Alignment::Support);
    }

    // §4.3 step 5: normal mode down-weights counter evidence, war mode
    // counts it in full.
    #[tokio::test]
    async fn normal_mode_down_weights_counter_evidence_relative_to_war_mode() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();
        let embedder = MockEmbedder::new();
        let registry = MinisterRegistry::new();

        for (id, text) in [
            ("r1", "never retreat, avoid every warning sign"),
            ("r2", "proceed and advance with confidence"),
        ] {
            let vector = embedder.embed(text).await.unwrap();
            store
                .upsert(
                    Domain::Risk,
                    EmbeddedChunk { chunk: chunk(id, "b1", Domain::Risk, text), vector },
                )
                .unwrap();
        }

        let query = "never retreat, avoid every warning sign";

        let normal = retrieve_for_minister(
            &registry, &embedder, &store, MinisterId::Risk, query, 5, Mode::Normal, None,
        )
        .await
        .unwrap();
        let war = retrieve_for_minister(
            &registry, &embedder, &store, MinisterId::Risk, query, 5, Mode::War, None,
        )
        .await
        .unwrap();

        let normal_hits = match normal {
            RetrievedSet::Hits(h) => h,
            RetrievedSet::InsufficientKnowledge => panic!("expected hits"),
        };
        let war_hits = match war {
            RetrievedSet::Hits(h) => h,
            RetrievedSet::InsufficientKnowledge => panic!("expected hits"),
        };

        let normal_counter = normal_hits
            .iter()
            .find(|h| h.alignment == Alignment::Counter)
            .expect("counter hit present in normal mode");
        let war_counter = war_hits
            .iter()
            .find(|h| h.alignment == Alignment::Counter)
            .expect("counter hit present in war mode");

        assert!(normal_counter.hit.score < war_counter.hit.score);
    }
}
