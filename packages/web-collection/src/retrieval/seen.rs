//! Invocation-scoped registry of result links already emitted.

use std::collections::HashSet;

/// Links seen so far in one retrieval run.
///
/// Each run owns a fresh registry; nothing is shared between runs. Links are
/// compared as exact strings.
#[derive(Debug, Default)]
pub struct SeenRegistry {
    links: HashSet<String>,
}

impl SeenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `link`; returns `true` if it had not been seen before.
    pub fn insert_if_new(&mut self, link: &str) -> bool {
        if self.links.contains(link) {
            return false;
        }
        self.links.insert(link.to_string())
    }

    pub fn contains(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
