//! Minister bindings (§3, §4.3): per-minister domain/book ACL, fixed at
//! runtime. Represented as data over the closed `MinisterId`
//! enumeration, per Design Notes §9 ("duck-typed minister objects...
//! tagged variants... behavior differences are data, not subclass
//! overrides").

use crate::domain::Domain;
use crate::types::{AllowedBooks, MinisterBinding, MinisterId};
use std::collections::BTreeMap;
use std::collections::BTreeSet;

fn domains(tags: &[Domain]) -> BTreeSet<Domain> {
    tags.iter().copied().collect()
}

/// The fixed binding table. Every minister is bound to every book
/// (`AllowedBooks::All`) by default - book-level restriction is a
/// deployment concern layered on top via `with_book_restriction`.
pub fn default_bindings() -> BTreeMap<MinisterId, MinisterBinding> {
    use Domain::*;
    use MinisterId::*;

    let table: [(MinisterId, &[Domain]); 15] = [
        (Power, &[Power, Leadership, Organization]),
        (Psychology, &[Psychology, Deception, Leadership]),
        (Conflict, &[Conflict, Power, Risk]),
        (Intelligence, &[Intelligence, Deception, Timing]),
        (Narrative, &[Psychology, Deception, Diplomacy]),
        (Timing, &[Timing, Adaptation, Risk]),
        (Optionality, &[Risk, Resources, Adaptation]),
        (Truth, &[Law, Morality, Intelligence]),
        (Risk, &[Risk, Resources, Conflict]),
        (Legitimacy, &[Law, Morality, Diplomacy]),
        (Technology, &[Organization, Resources, Adaptation]),
        (Data, &[Intelligence, Organization, Timing]),
        (Operations, &[Organization, Resources, Leadership]),
        (Diplomacy, &[Diplomacy, Morality, Leadership]),
        (Strategy, &[Strategy, Timing, Adaptation]),
    ];

    table
        .into_iter()
        .map(|(minister, tags)| {
            (
                minister,
                MinisterBinding {
                    minister,
                    allowed_domains: domains(tags),
                    allowed_books: AllowedBooks::All,
                },
            )
        })
        .collect()
}

pub struct MinisterRegistry {
    bindings: BTreeMap<MinisterId, MinisterBinding>,
}

impl MinisterRegistry {
    pub fn new() -> Self {
        Self {
            bindings: default_bindings(),
        }
    }

    pub fn binding(&self, minister: MinisterId) -> &MinisterBinding {
        self.bindings
            .get(&minister)
            .expect("every MinisterId has a default binding")
    }

    pub fn restrict_books(&mut self, minister: MinisterId, books: AllowedBooks) {
        if let Some(binding) = self.bindings.get_mut(&minister) {
            binding.allowed_books = books;
        }
    }
}

impl Default for MinisterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_minister_has_a_binding() {
        let registry = MinisterRegistry::new();
        for m in MinisterId::ALL {
            let binding = registry.binding(m);
            assert!(!binding.allowed_domains.is_empty());
        }
    }

    #[test]
    fn default_books_allow_all() {
        let registry = MinisterRegistry::new();
        let binding = registry.binding(MinisterId::Risk);
        assert!(binding.allowed_books.permits("any-book-id"));
    }

    #[test]
    fn restricting_books_is_respected() {
        let mut registry = MinisterRegistry::new();
        registry.restrict_books(
            MinisterId::Risk,
            AllowedBooks::Only(BTreeSet::from(["b1".to_string()])),
        );
        let binding = registry.binding(MinisterId::Risk);
        assert!(binding.allowed_books.permits("b1"));
        assert!(!binding.allowed_books.permits("b2"));
    }
}
