//! Tag → key index.
//!
//! Tracks which cache keys carry each tag so a tag invalidation can find its
//! cohort without scanning the store. The reverse direction (key → tags) is
//! held by the entries themselves.

use std::collections::{HashMap, HashSet};

/// Maps each tag to the set of keys currently stored under it.
///
/// Buckets never stay empty: removing the last key of a tag drops the tag.
#[derive(Debug, Default)]
pub struct TagIndex {
    buckets: HashMap<String, HashSet<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` under every tag in `tags`.
    pub fn register<'a>(&mut self, key: &str, tags: impl IntoIterator<Item = &'a str>) {
        for tag in tags {
            self.buckets
                .entry(tag.to_string())
                .or_default()
                .insert(key.to_string());
        }
    }

    /// Remove `key` from the buckets of `tags`, dropping buckets that empty out.
    pub fn unregister<'a>(&mut self, key: &str, tags: impl IntoIterator<Item = &'a str>) {
        for tag in tags {
            if let Some(keys) = self.buckets.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.buckets.remove(tag);
                }
            }
        }
    }

    /// Detach and return the whole cohort for `tag`.
    pub fn take(&mut self, tag: &str) -> HashSet<String> {
        self.buckets.remove(tag).unwrap_or_default()
    }

    /// Keys currently stored under `tag`.
    pub fn keys_for(&self, tag: &str) -> HashSet<String> {
        self.buckets.get(tag).cloned().unwrap_or_default()
    }

    pub fn contains_tag(&self, tag: &str) -> bool {
        self.buckets.contains_key(tag)
    }

    /// Number of non-empty tag buckets.
    pub fn tag_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let mut index = TagIndex::new();
        index.register("getAllBooks-1-3", ["booksCache"]);

        let keys = index.keys_for("booksCache");
        assert!(keys.contains("getAllBooks-1-3"));
        assert!(index.keys_for("AuthorsCache").is_empty());
    }

    #[test]
    fn unregister_drops_empty_buckets() {
        let mut index = TagIndex::new();
        index.register("k1", ["T", "U"]);
        assert_eq!(index.tag_count(), 2);

        index.unregister("k1", ["T", "U"]);
        assert_eq!(index.tag_count(), 0);
        assert!(!index.contains_tag("T"));
    }

    #[test]
    fn unregister_keeps_other_keys() {
        let mut index = TagIndex::new();
        index.register("k1", ["T"]);
        index.register("k2", ["T"]);

        index.unregister("k1", ["T"]);
        let keys = index.keys_for("T");
        assert_eq!(keys.len(), 1);
        assert!(keys.contains("k2"));
    }

    #[test]
    fn take_detaches_cohort() {
        let mut index = TagIndex::new();
        index.register("k1", ["T"]);
        index.register("k2", ["T", "U"]);

        let taken = index.take("T");
        assert_eq!(taken.len(), 2);
        assert!(!index.contains_tag("T"));
        assert!(index.contains_tag("U"));
    }

    #[test]
    fn clear_removes_all_buckets() {
        let mut index = TagIndex::new();
        index.register("k1", ["T"]);
        index.clear();
        assert_eq!(index.tag_count(), 0);
    }
}
