//! ISBN → review ID index
use crate::storage::{read_json, write_json_atomic, ReviewId};
use crate::AjumError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Mapping from ISBN to the set of reviews written about it
///
/// Serialized as a plain JSON object `{"<isbn>": ["<review id>", ...]}`.
/// ISBN keys are unique; repeated sightings of an ISBN merge their ID sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    entries: BTreeMap<String, BTreeSet<ReviewId>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an index file
    ///
    /// Fails with `AjumError::MissingFile` if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, AjumError> {
        read_json(path)
    }

    /// Loads an index file, or returns an empty index if there is none yet
    pub fn load_or_default(path: &Path) -> Result<Self, AjumError> {
        match Self::load(path) {
            Err(AjumError::MissingFile { .. }) => Ok(Self::new()),
            other => other,
        }
    }

    /// Atomically writes the index to `path`
    pub fn save(&self, path: &Path) -> Result<(), AjumError> {
        write_json_atomic(path, self)
    }

    /// Records that `review_id` reviews `isbn`
    ///
    /// Returns true if the pair was not present before.
    pub fn insert(&mut self, isbn: impl Into<String>, review_id: ReviewId) -> bool {
        self.entries.entry(isbn.into()).or_default().insert(review_id)
    }

    /// Unions `other` into this index without dropping existing entries
    ///
    /// Returns the number of (ISBN, review ID) pairs that were new.
    pub fn merge(&mut self, other: Index) -> usize {
        let mut added = 0;
        for (isbn, ids) in other.entries {
            let entry = self.entries.entry(isbn).or_default();
            for id in ids {
                if entry.insert(id) {
                    added += 1;
                }
            }
        }
        added
    }

    pub fn get(&self, isbn: &str) -> Option<&BTreeSet<ReviewId>> {
        self.entries.get(isbn)
    }

    pub fn contains(&self, isbn: &str, review_id: &ReviewId) -> bool {
        self.entries
            .get(isbn)
            .is_some_and(|ids| ids.contains(review_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<ReviewId>)> {
        self.entries.iter()
    }

    /// Number of distinct ISBNs
    pub fn isbn_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of (ISBN, review ID) pairs
    pub fn review_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    /// Number of distinct review IDs across all ISBNs
    pub fn unique_review_count(&self) -> usize {
        self.entries
            .values()
            .flatten()
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, ReviewId)> for Index {
    fn from_iter<I: IntoIterator<Item = (String, ReviewId)>>(iter: I) -> Self {
        let mut index = Index::new();
        for (isbn, id) in iter {
            index.insert(isbn, id);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Index {
        [
            ("12345".to_string(), ReviewId::new("r1")),
            ("67890".to_string(), ReviewId::new("r2")),
            ("67890".to_string(), ReviewId::new("r3")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut index = Index::new();
        assert!(index.insert("111", ReviewId::new("1")));
        assert!(!index.insert("111", ReviewId::new("1")));
        assert!(index.insert("111", ReviewId::new("2")));
        assert_eq!(index.isbn_count(), 1);
        assert_eq!(index.review_count(), 2);
    }

    #[test]
    fn test_merge_keeps_prior_entries() {
        let mut index = sample();
        let mut newer = Index::new();
        newer.insert("67890", ReviewId::new("r3"));
        newer.insert("67890", ReviewId::new("r4"));
        newer.insert("99999", ReviewId::new("r5"));

        assert_eq!(index.merge(newer), 2);
        assert_eq!(index.isbn_count(), 3);
        assert!(index.contains("12345", &ReviewId::new("r1")));
        assert_eq!(index.get("67890").unwrap().len(), 3);
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let index = sample();

        index.save(&path).unwrap();
        assert_eq!(Index::load(&path).unwrap(), index);
    }

    #[test]
    fn test_loads_integer_ids() {
        let index: Index = serde_json::from_str(r#"{"12345": [1, 2], "67890": ["3"]}"#).unwrap();
        assert!(index.contains("12345", &ReviewId::new("2")));
        assert_eq!(index.review_count(), 3);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let index = Index::load_or_default(&dir.path().join("missing.json")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_unique_review_count() {
        let mut index = sample();
        index.insert("55555", ReviewId::new("r1"));
        assert_eq!(index.review_count(), 4);
        assert_eq!(index.unique_review_count(), 3);
    }
}
