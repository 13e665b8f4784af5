//! Ingestion orchestration (§4.1): phase-1, phase-2, chunk/hash/dedup,
//! parallel-bounded embedding, all resumable and crash-safe.
//!
//! Embedding calls are dispatched through a fixed-capacity semaphore
//! (`EMBED_CONCURRENCY`, default 2); the vector-store insert itself is
//! serialized by `VectorStore`'s internal per-domain write lock, so no
//! extra coordination is needed beyond bounding the embedder calls.

use crate::config::Config;
use crate::embed::Embedder;
use crate::ingest::chunker::chunk_doctrine;
use crate::ingest::doctrine::{commit_doctrine, extract_doctrine, load_doctrine};
use crate::ingest::progress::{MetricsTracker, ProgressLedger};
use crate::ingest::structurer::{chapter_records, commit_structure, load_structure, structure_book};
use crate::llm::Llm;
use crate::types::BookStructure;
use crate::vector_store::{UpsertOutcome, VectorStore};
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub total: usize,
    pub inserted: usize,
    pub skipped_duplicate: usize,
    pub unresolved_chapters: Vec<u32>,
}

pub struct IngestPipeline {
    pub llm: Arc<dyn Llm>,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<VectorStore>,
    pub progress: Arc<Mutex<ProgressLedger>>,
    pub embed_concurrency: usize,
}

impl IngestPipeline {
    pub fn new(
        llm: Arc<dyn Llm>,
        embedder: Arc<dyn Embedder>,
        store: Arc<VectorStore>,
        progress: ProgressLedger,
        embed_concurrency: usize,
    ) -> Self {
        Self {
            llm,
            embedder,
            store,
            progress: Arc::new(Mutex::new(progress)),
            embed_concurrency: embed_concurrency.max(1),
        }
    }

    pub async fn ingest_book(
        &self,
        cfg: &Config,
        book_id: &str,
        book_text: &str,
        version: u32,
    ) -> Result<IngestOutcome> {
        let book_dir = cfg.book_dir(book_id);

        // Phase-1: reuse an existing commit if present (resumability).
        let structure: BookStructure = match load_structure(&book_dir)? {
            Some(s) => s,
            None => {
                let s = structure_book(self.llm.as_ref(), book_id, book_text).await?;
                commit_structure(&book_dir, &s)?;
                s
            }
        };
        let chapters = chapter_records(book_id, &structure);
        let chapter_count = chapters.len() as u32;

        // Phase-2: per chapter, independently; a failure is logged and
        // skipped, never aborts the rest of the book (§4.1, §7).
        let mut unresolved_chapters = Vec::new();
        let mut doctrine_records = Vec::new();
        for chapter in &chapters {
            if let Some(existing) = load_doctrine(&book_dir, chapter.chapter_index)? {
                doctrine_records.push(existing);
                continue;
            }
            match extract_doctrine(self.llm.as_ref(), book_id, chapter, chapter_count).await {
                Ok(record) => {
                    commit_doctrine(&book_dir, &record)?;
                    doctrine_records.push(record);
                }
                Err(e) => {
                    tracing::warn!(chapter = chapter.chapter_index, error = %e, "phase-2 extraction failed, skipping chapter");
                    unresolved_chapters.push(chapter.chapter_index);
                }
            }
        }

        // Chunk, hash, dedup, embed.
        let chunks: Vec<_> = doctrine_records
            .iter()
            .flat_map(|record| chunk_doctrine(record, version))
            .collect();
        let total = chunks.len();

        let inserted = Arc::new(AtomicUsize::new(0));
        let skipped = Arc::new(AtomicUsize::new(0));
        let metrics = Arc::new(Mutex::new(MetricsTracker::new(total)));
        let semaphore = Arc::new(Semaphore::new(self.embed_concurrency));

        let mut tasks = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let already_seen = {
                let progress = self.progress.lock().unwrap();
                progress.contains(&chunk.chunk_id)
            } || self.store.contains(&chunk.chunk_id);

            if already_seen {
                skipped.fetch_add(1, Ordering::SeqCst);
                metrics.lock().unwrap().record_skipped();
                continue;
            }

            let embedder = self.embedder.clone();
            let store = self.store.clone();
            let progress = self.progress.clone();
            let semaphore = semaphore.clone();
            let inserted = inserted.clone();
            let skipped = skipped.clone();
            let metrics = metrics.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                let vector = match embedder.embed(&chunk.text).await {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(chunk_id = %chunk.chunk_id, error = %e, "embedding failed, chunk will be retried next run");
                        return;
                    }
                };
                drop(_permit);

                let domain = chunk.domain;
                let chunk_id = chunk.chunk_id.clone();
                let embedded = crate::types::EmbeddedChunk { chunk, vector };

                match store.upsert(domain, embedded) {
                    Ok(UpsertOutcome::Inserted) => {
                        let mut progress = progress.lock().unwrap();
                        if progress.record_complete(&chunk_id).is_ok() {
                            inserted.fetch_add(1, Ordering::SeqCst);
                            metrics.lock().unwrap().record_completed();
                        }
                    }
                    Ok(UpsertOutcome::Duplicate) => {
                        skipped.fetch_add(1, Ordering::SeqCst);
                        metrics.lock().unwrap().record_skipped();
                    }
                    Err(e) => {
                        tracing::error!(chunk_id = %chunk_id, error = %e, "vector store insert failed");
                    }
                }
            }));
        }

        for task in tasks {
            task.await.expect("ingest worker task panicked");
        }

        metrics.lock().unwrap().write_snapshot(&cfg.ingest_metrics_path())?;

        Ok(IngestOutcome {
            total,
            inserted: inserted.load(Ordering::SeqCst),
            skipped_duplicate: skipped.load(Ordering::SeqCst),
            unresolved_chapters,
        })
    }
}
