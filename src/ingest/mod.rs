//! Doctrine ingestion (§4.1): one pipeline, two phases - structuring,
//! then per-chapter doctrine extraction - followed by deterministic
//! chunking and bounded-concurrency embedding.

pub mod chunker;
pub mod doctrine;
pub mod pipeline;
pub mod progress;
pub mod structurer;

pub use pipeline::{IngestOutcome, IngestPipeline};
