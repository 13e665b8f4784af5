//! Book registry (§4.2): loads `BookMetadata` for every known book at
//! startup from `books/metadata/<book_id>.yaml` with `serde_yaml`
//! (see DESIGN.md for why this dependency is here).

use crate::types::BookMetadata;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

pub struct BookRegistry {
    books: HashMap<String, BookMetadata>,
}

impl BookRegistry {
    pub fn load(metadata_dir: &Path) -> Result<Self> {
        let mut books = HashMap::new();
        if !metadata_dir.exists() {
            return Ok(Self { books });
        }

        for entry in std::fs::read_dir(metadata_dir)
            .with_context(|| format!("failed to read {metadata_dir:?}"))?
        {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {path:?}"))?;
            let meta: BookMetadata = serde_yaml::from_str(&contents)
                .with_context(|| format!("invalid book metadata in {path:?}"))?;
            books.insert(meta.book_id.clone(), meta);
        }

        Ok(Self { books })
    }

    /// Returns the stored metadata, or the documented default for an
    /// unknown book (§4.2): empty domain/tone sets, priorities 0.5.
    pub fn metadata(&self, book_id: &str) -> BookMetadata {
        self.books
            .get(book_id)
            .cloned()
            .unwrap_or_else(|| BookMetadata::unknown(book_id))
    }

    pub fn all_books(&self) -> Vec<&BookMetadata> {
        self.books.values().collect()
    }

    pub fn insert(&mut self, meta: BookMetadata) {
        self.books.insert(meta.book_id.clone(), meta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Tone};
    use std::collections::BTreeSet;

    #[test]
    fn unknown_book_returns_default_metadata() {
        let registry = BookRegistry {
            books: HashMap::new(),
        };
        let meta = registry.metadata("ghost-book");
        assert!(meta.domains.is_empty());
        assert!(meta.tones.is_empty());
        assert_eq!(meta.priority.normal, 0.5);
        assert_eq!(meta.priority.war, 0.5);
        assert_eq!(meta.priority.quick, 0.5);
    }

    #[test]
    fn loads_yaml_metadata_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let meta = BookMetadata {
            book_id: "art-of-war".to_string(),
            domains: BTreeSet::from([Domain::Strategy, Domain::Conflict]),
            tones: BTreeSet::from([Tone::Ruthless]),
            priority: crate::types::ModePriority {
                normal: 0.8,
                war: 0.9,
                quick: 0.6,
            },
        };
        std::fs::write(
            dir.path().join("art-of-war.yaml"),
            serde_yaml::to_string(&meta).unwrap(),
        )
        .unwrap();

        let registry = BookRegistry::load(dir.path()).unwrap();
        let loaded = registry.metadata("art-of-war");
        assert_eq!(loaded.domains, meta.domains);
        assert_eq!(loaded.priority.war, 0.9);
    }
}
