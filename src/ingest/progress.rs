//! Progress ledger & ETA metrics (§4.1 "Progress & ETA", §6).
//!
//! The progress ledger is the first of two duplicate-detection sources
//! consulted before embedding a chunk (the other being
//! `VectorStore::contains`) - it reflects inserts completed since the
//! last restart, while the vector store is the permanent record.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProgressRecord {
    chunk_id: String,
    ts: chrono::DateTime<chrono::Utc>,
}

/// Append-only JSON-lines file of completed chunk inserts. Appends are
/// crash-safe: open-append-write-flush per record (§4.1, §5).
pub struct ProgressLedger {
    path: PathBuf,
    seen: HashSet<String>,
}

impl ProgressLedger {
    pub fn load(path: &Path) -> Result<Self> {
        let mut seen = HashSet::new();
        if path.exists() {
            let file = std::fs::File::open(path)
                .with_context(|| format!("failed to open {path:?}"))?;
            for line in std::io::BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: ProgressRecord = serde_json::from_str(&line)
                    .with_context(|| format!("corrupt progress ledger record in {path:?}"))?;
                seen.insert(record.chunk_id);
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            seen,
        })
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.seen.contains(chunk_id)
    }

    pub fn record_complete(&mut self, chunk_id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = ProgressRecord {
            chunk_id: chunk_id.to_string(),
            ts: chrono::Utc::now(),
        };
        let line = serde_json::to_string(&record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {:?} for append", self.path))?;
        writeln!(file, "{line}")?;
        file.flush()?;
        self.seen.insert(chunk_id.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Advisory progress snapshot (§4.1): never affects correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestMetrics {
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub rate_per_sec: Option<f64>,
    pub eta_seconds: Option<f64>,
    pub percent_complete: f64,
}

pub struct MetricsTracker {
    started_at: Instant,
    total: usize,
    completed: usize,
    skipped: usize,
}

impl MetricsTracker {
    pub fn new(total: usize) -> Self {
        Self {
            started_at: Instant::now(),
            total,
            completed: 0,
            skipped: 0,
        }
    }

    pub fn record_completed(&mut self) {
        self.completed += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn snapshot(&self) -> IngestMetrics {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        let rate_per_sec = if elapsed > 0.0 && self.completed > 0 {
            Some(self.completed as f64 / elapsed)
        } else {
            None
        };
        let eta_seconds = rate_per_sec.map(|rate| {
            let remaining = self.total.saturating_sub(self.completed + self.skipped) as f64;
            remaining / rate
        });
        let percent_complete = if self.total == 0 {
            100.0
        } else {
            100.0 * (self.completed + self.skipped) as f64 / self.total as f64
        };
        IngestMetrics {
            total: self.total,
            completed: self.completed,
            skipped: self.skipped,
            rate_per_sec,
            eta_seconds,
            percent_complete,
        }
    }

    pub fn write_snapshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot = self.snapshot();
        std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)
            .with_context(|| format!("failed to write {path:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_contains() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.jsonl");
        let mut ledger = ProgressLedger::load(&path).unwrap();
        assert!(!ledger.contains("c1"));
        ledger.record_complete("c1").unwrap();
        assert!(ledger.contains("c1"));
    }

    #[test]
    fn reload_preserves_seen_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.jsonl");
        {
            let mut ledger = ProgressLedger::load(&path).unwrap();
            ledger.record_complete("c1").unwrap();
            ledger.record_complete("c2").unwrap();
        }
        let reloaded = ProgressLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("c2"));
    }

    #[test]
    fn eta_is_null_until_rate_is_positive() {
        let tracker = MetricsTracker::new(10);
        let snap = tracker.snapshot();
        assert!(snap.rate_per_sec.is_none());
        assert!(snap.eta_seconds.is_none());
    }

    #[test]
    fn completed_and_skipped_drive_percent() {
        let mut tracker = MetricsTracker::new(4);
        tracker.record_completed();
        tracker.record_completed();
        tracker.record_skipped();
        let snap = tracker.snapshot();
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.skipped, 1);
        assert!((snap.percent_complete - 75.0).abs() < 1e-9);
    }
}
