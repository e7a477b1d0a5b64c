//! Deletion deduplication
//!
//! The host may schedule the same entity for deletion more than once within
//! a flush (cascades, explicit removes). Only the first notification of a
//! (class, identifier) pair is audited.

use entaudit_core::{ClassName, Identifier};
use std::collections::HashSet;

/// Stable hash of an entity: class name followed by identifier component
/// values, separated by single spaces, in identifier declaration order
pub fn entity_hash(class: &ClassName, identifier: &Identifier) -> String {
    let mut hash = class.as_str().to_string();
    for (_, value) in identifier.iter() {
        hash.push(' ');
        hash.push_str(&value.to_string());
    }
    hash
}

/// Per-flush set of already seen entity hashes
#[derive(Debug, Default)]
pub struct ChangeDeduplicator {
    seen: HashSet<String>,
}

impl ChangeDeduplicator {
    /// Create an empty deduplicator
    pub fn new() -> Self {
        ChangeDeduplicator {
            seen: HashSet::new(),
        }
    }

    /// Record the entity; returns false if it was already seen this flush
    pub fn first_sighting(&mut self, class: &ClassName, identifier: &Identifier) -> bool {
        self.seen.insert(entity_hash(class, identifier))
    }

    /// Whether the entity was already seen this flush
    pub fn contains(&self, class: &ClassName, identifier: &Identifier) -> bool {
        self.seen.contains(&entity_hash(class, identifier))
    }

    /// Forget everything seen
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    /// Number of distinct entities seen
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if nothing was seen
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
