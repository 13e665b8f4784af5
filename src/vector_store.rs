//! Vector store (§4.2): per-domain indices, upsert/contains/search.
//!
//! Indices are partitioned per `Domain` - cross-domain queries are
//! unsupported by construction, because ministers are permissioned per
//! domain (§4.3). Each domain's index is append-only on disk
//! (`vector_store/<domain>/chunks.jsonl`, one `EmbeddedChunk` per
//! line) and held in memory as a `chunk_id -> EmbeddedChunk` map behind
//! a `RwLock`: one writer, many readers, readers never block a writer
//! they arrived before and always see a snapshot at least as recent as
//! the last completed insert (§5).

use crate::domain::Domain;
use crate::embed::cosine_similarity;
use crate::types::{BookId, ChunkId, EmbeddedChunk};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub enum UpsertOutcome {
    Inserted,
    Duplicate,
}

struct DomainIndex {
    path: PathBuf,
    chunks: RwLock<BTreeMap<ChunkId, EmbeddedChunk>>,
}

impl DomainIndex {
    fn load(dir: &Path, domain: Domain) -> Result<Self> {
        let domain_dir = dir.join(domain.as_str());
        std::fs::create_dir_all(&domain_dir)?;
        let path = domain_dir.join("chunks.jsonl");

        let mut chunks = BTreeMap::new();
        if path.exists() {
            let file = std::fs::File::open(&path)
                .with_context(|| format!("failed to open {path:?}"))?;
            for line in std::io::BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let ec: EmbeddedChunk = serde_json::from_str(&line)
                    .with_context(|| format!("corrupt vector store record in {path:?}"))?;
                chunks.insert(ec.chunk.chunk_id.clone(), ec);
            }
        }

        Ok(Self {
            path,
            chunks: RwLock::new(chunks),
        })
    }

    fn contains(&self, chunk_id: &str) -> bool {
        self.chunks.read().unwrap().contains_key(chunk_id)
    }

    /// Insert is serialized: callers hold no lock across the await, so
    /// the only mutual exclusion needed is this in-process write lock.
    fn upsert(&self, embedded: EmbeddedChunk) -> Result<UpsertOutcome> {
        let mut guard = self.chunks.write().unwrap();
        if guard.contains_key(&embedded.chunk.chunk_id) {
            return Ok(UpsertOutcome::Duplicate);
        }

        let line = serde_json::to_string(&embedded)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {:?} for append", self.path))?;
        writeln!(file, "{line}")?;
        file.flush()?;

        guard.insert(embedded.chunk.chunk_id.clone(), embedded);
        Ok(UpsertOutcome::Inserted)
    }

    fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        book_filter: Option<&HashSet<BookId>>,
    ) -> Vec<SearchHit> {
        let guard = self.chunks.read().unwrap();
        let mut hits: Vec<SearchHit> = guard
            .values()
            .filter(|ec| {
                book_filter
                    .map(|books| books.contains(&ec.chunk.book_id))
                    .unwrap_or(true)
            })
            .map(|ec| SearchHit {
                chunk_id: ec.chunk.chunk_id.clone(),
                score: cosine_similarity(query_vec, &ec.vector) as f64,
                payload: ec.chunk.clone(),
            })
            .collect();

        // Deterministic ordering (§5, §8.7): (-score, chunk_id).
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);
        hits
    }

    fn len(&self) -> usize {
        self.chunks.read().unwrap().len()
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: ChunkId,
    pub score: f64,
    pub payload: crate::types::Chunk,
}

pub struct VectorStore {
    indices: HashMap<Domain, DomainIndex>,
}

impl VectorStore {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut indices = HashMap::new();
        for domain in Domain::ALL {
            indices.insert(domain, DomainIndex::load(dir, domain)?);
        }
        Ok(Self { indices })
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.indices.values().any(|idx| idx.contains(chunk_id))
    }

    pub fn upsert(&self, domain: Domain, embedded: EmbeddedChunk) -> Result<UpsertOutcome> {
        self.indices
            .get(&domain)
            .expect("all 15 domains are pre-populated in VectorStore::open")
            .upsert(embedded)
    }

    /// `search(domain, query_vec, k, book_filter?)` (§4.2).
    pub fn search(
        &self,
        domain: Domain,
        query_vec: &[f32],
        k: usize,
        book_filter: Option<&HashSet<BookId>>,
    ) -> Vec<SearchHit> {
        self.indices
            .get(&domain)
            .map(|idx| idx.search(query_vec, k, book_filter))
            .unwrap_or_default()
    }

    pub fn domain_size(&self, domain: Domain) -> usize {
        self.indices.get(&domain).map(|i| i.len()).unwrap_or(0)
    }

    pub fn total_size(&self) -> usize {
        self.indices.values().map(|i| i.len()).sum()
    }
}
