//! Error taxonomy (§7).
//!
//! `ValidationError` covers the "reject the unit, continue" class of
//! failure: malformed phase-1/phase-2 output, domains outside the
//! enum, gaps in chapter indices, dangling cross-references. These are
//! never bubbled as a process-ending `anyhow` bail from inside a phase
//! loop - the ingestion pipeline catches them, logs, and moves on.
//! `IntegrityError` is the fatal class (§7's "Integrity" row): it halts
//! ingestion and is never auto-healed.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty chapter list")]
    EmptyChapterList,

    #[error("chapter indices are not dense 1..N: {0}")]
    NonDenseChapterIndices(String),

    #[error("chapter {0} has an empty title")]
    EmptyChapterTitle(u32),

    #[error("chapter {0} has empty text")]
    EmptyChapterText(u32),

    #[error("domain '{0}' is outside the closed enumeration")]
    UnknownDomain(String),

    #[error("doctrine record for chapter {0} declares no domains")]
    NoDomains(u32),

    #[error("doctrine record for chapter {0} declares more than 3 domains")]
    TooManyDomains(u32),

    #[error("cross_reference {reference} in chapter {chapter} does not resolve to an existing chapter")]
    DanglingCrossReference { chapter: u32, reference: u32 },

    #[error("field '{field}' in chapter {chapter} contains an empty string entry")]
    EmptyListEntry { chapter: u32, field: &'static str },

    #[error("LLM output failed schema validation: {0}")]
    SchemaMismatch(String),
}

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("vector store already holds a different chunk under id {0}")]
    DuplicateChunkIdConflict(String),

    #[error("cross_reference graph for book {0} points outside the book")]
    DanglingCrossReferenceInStore(String),
}

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("external call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("external call failed: {0}")]
    Failed(String),
}
