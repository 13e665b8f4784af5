//! The explicit application context (§9 "Global state"): every
//! process-wide dependency - registries, stores, the ledger, the
//! calibration cache - lives here and is threaded through the
//! pipeline, rather than as ad-hoc singletons. Built once at entry.

use crate::book_registry::BookRegistry;
use crate::config::Config;
use crate::embed::{Embedder, MockEmbedder, OnnxEmbedder};
use crate::ledger::Ledger;
use crate::llm::{HttpLlm, Llm, MockLlm};
use crate::minister::MinisterRegistry;
use crate::vector_store::VectorStore;
use anyhow::Result;
use std::sync::Arc;

pub struct Context {
    pub config: Config,
    pub llm: Arc<dyn Llm>,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<VectorStore>,
    pub books: BookRegistry,
    pub ministers: MinisterRegistry,
    pub ledger: Ledger,
}

impl Context {
    /// Builds the production context: `HttpLlm`/`OnnxEmbedder` backed
    /// by `Config::from_env`, all stores opened at their documented
    /// paths under `DATA_DIR` (§6).
    pub fn bootstrap(config: Config) -> Result<Self> {
        let llm: Arc<dyn Llm> = match &config.llm_endpoint {
            Some(endpoint) => Arc::new(HttpLlm::new(endpoint.clone())),
            None => Arc::new(MockLlm::new(Vec::new())),
        };
        let embedder: Arc<dyn Embedder> = Arc::new(OnnxEmbedder::load(&crate::embed::get_model_dir())?);
        let store = Arc::new(VectorStore::open(&config.vector_store_dir())?);
        let books = BookRegistry::load(&config.book_metadata_dir())?;
        let ministers = MinisterRegistry::new();
        let ledger = Ledger::open(&config.ledger_db_path())?;

        Ok(Self { config, llm, embedder, store, books, ministers, ledger })
    }

    /// A fully mocked context for tests and offline runs: no network,
    /// no ONNX runtime, an in-memory ledger.
    pub fn test_context(data_dir: &std::path::Path) -> Result<Self> {
        let config = Config {
            llm_endpoint: None,
            embed_model: "mock".to_string(),
            embed_concurrency: crate::config::DEFAULT_EMBED_CONCURRENCY,
            data_dir: data_dir.to_path_buf(),
        };
        let llm: Arc<dyn Llm> = Arc::new(MockLlm::new(Vec::new()));
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new());
        let store = Arc::new(VectorStore::open(&config.vector_store_dir())?);
        let books = BookRegistry::load(&config.book_metadata_dir())?;
        let ministers = MinisterRegistry::new();
        let ledger = Ledger::open_in_memory()?;

        Ok(Self { config, llm, embedder, store, books, ministers, ledger })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builds_without_external_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::test_context(dir.path()).unwrap();
        assert_eq!(ctx.store.total_size(), 0);
        assert!(ctx.ledger.all_events().unwrap().is_empty());
    }
}
