//! ISBN → review record database
use crate::storage::{read_json, write_json_atomic, ReviewId, ReviewRecord};
use crate::AjumError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// The consolidated local dataset
///
/// One ISBN may carry several reviews. Records are appended in the order they
/// are merged; a record whose review ID is already stored under the same ISBN
/// is ignored, which makes re-merging idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Database {
    records: BTreeMap<String, Vec<ReviewRecord>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, AjumError> {
        read_json(path)
    }

    pub fn load_or_default(path: &Path) -> Result<Self, AjumError> {
        match Self::load(path) {
            Err(AjumError::MissingFile { .. }) => Ok(Self::new()),
            other => other,
        }
    }

    /// Atomically writes the database to `path`
    pub fn save(&self, path: &Path) -> Result<(), AjumError> {
        write_json_atomic(path, self)
    }

    /// Appends `record` under `isbn` unless that review is already stored there
    ///
    /// Returns true if the record was added.
    pub fn merge_record(&mut self, isbn: impl Into<String>, record: ReviewRecord) -> bool {
        let entry = self.records.entry(isbn.into()).or_default();
        if entry.iter().any(|r| r.review_id == record.review_id) {
            return false;
        }
        entry.push(record);
        true
    }

    pub fn contains(&self, isbn: &str, review_id: &ReviewId) -> bool {
        self.records
            .get(isbn)
            .is_some_and(|records| records.iter().any(|r| &r.review_id == review_id))
    }

    pub fn get(&self, isbn: &str) -> Option<&[ReviewRecord]> {
        self.records.get(isbn).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<ReviewRecord>)> {
        self.records.iter()
    }

    /// Every record, paired with the ISBN it is stored under
    pub fn records(&self) -> impl Iterator<Item = (&str, &ReviewRecord)> {
        self.records
            .iter()
            .flat_map(|(isbn, records)| records.iter().map(move |r| (isbn.as_str(), r)))
    }

    pub fn isbn_count(&self) -> usize {
        self.records.len()
    }

    pub fn review_count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.values().all(Vec::is_empty)
    }
}
