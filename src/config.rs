//! Environment configuration, loaded once at entry.
//!
//! Plain `std::env`/`dirs`, no config framework: a handful of named
//! variables with sane defaults.

use std::path::PathBuf;

/// Default bound on concurrent embedding calls (§5 concurrency model).
pub const DEFAULT_EMBED_CONCURRENCY: usize = 2;

#[derive(Debug, Clone)]
pub struct Config {
    pub llm_endpoint: Option<String>,
    pub embed_model: String,
    pub embed_concurrency: usize,
    pub data_dir: PathBuf,
}

impl Config {
    /// Read configuration from the environment, falling back to
    /// documented defaults for anything unset.
    pub fn from_env() -> Self {
        let llm_endpoint = std::env::var("LLM_ENDPOINT").ok();

        let embed_model = std::env::var("EMBED_MODEL")
            .unwrap_or_else(|_| "all-MiniLM-L6-v2".to_string());

        let embed_concurrency = std::env::var("EMBED_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_EMBED_CONCURRENCY);

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        Self {
            llm_endpoint,
            embed_model,
            embed_concurrency,
            data_dir,
        }
    }

    pub fn books_dir(&self) -> PathBuf {
        self.data_dir.join("books")
    }

    pub fn book_dir(&self, book_id: &str) -> PathBuf {
        self.books_dir().join(book_id)
    }

    pub fn book_metadata_dir(&self) -> PathBuf {
        self.books_dir().join("metadata")
    }

    pub fn vector_store_dir(&self) -> PathBuf {
        self.data_dir.join("vector_store")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    pub fn progress_ledger_path(&self) -> PathBuf {
        self.state_dir().join("ingest_progress.jsonl")
    }

    pub fn ingest_metrics_path(&self) -> PathBuf {
        self.state_dir().join("ingest_metrics.json")
    }

    pub fn ledger_db_path(&self) -> PathBuf {
        self.data_dir.join("ledger.db")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("counsel-engine")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_embed_concurrency() {
        std::env::remove_var("EMBED_CONCURRENCY");
        let cfg = Config::from_env();
        assert_eq!(cfg.embed_concurrency, DEFAULT_EMBED_CONCURRENCY);
    }
}
