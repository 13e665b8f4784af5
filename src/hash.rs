//! Content hashing for chunk identity and dedup (§3, §4.1).
//!
//! SHA-256 over content bytes, hex-encoded - only the deterministic
//! content-addressing half of what a provenance hash usually does;
//! there's no tamper-evidence requirement on the ledger here, so no
//! signing half is needed.

use sha2::{Digest, Sha256};

/// `chunk_id = stable_hash(book_id ∥ ":" ∥ version ∥ ":" ∥ text)` (§3, §8.3).
pub fn chunk_id(book_id: &str, version: u32, text: &str) -> String {
    stable_hash(&format!("{book_id}:{version}:{text}"))
}

/// SHA-256 over UTF-8 bytes, hex-encoded. Deterministic: same input
/// always produces the same id (§8.3).
pub fn stable_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
