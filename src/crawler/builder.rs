//! Local database from an index
//!
//! One unit per (ISBN, review) pair of the index. Workers only fetch and
//! parse; the database itself is merged in a single step once all results
//! are in, in index order, so the outcome does not depend on `jobs`.

use crate::crawler::pipeline::Pipeline;
use crate::state::{Failure, FailureKind, FailureReport};
use crate::storage::{Database, Index, ReviewId};
use crate::AjumError;

/// Result of a build or update run
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub database: Database,

    /// Reviews that produced no record, keyed by review ID
    pub failures: FailureReport,

    /// Records added to the database by this run
    pub merged: usize,

    /// Pairs already present in the database (update only)
    pub skipped: usize,
}

impl BuildReport {
    pub fn cancelled(&self) -> usize {
        self.failures
            .values()
            .filter(|f| f.kind == FailureKind::Cancelled)
            .count()
    }
}

pub struct DatabaseBuilder {
    pipeline: Pipeline,
}

impl DatabaseBuilder {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Fetches every review of `index` into a fresh database
    ///
    /// # Errors
    ///
    /// Only a broken cache directory aborts the build. Failed reviews end up
    /// in [`BuildReport::failures`] with their ISBN.
    pub async fn build(&self, index: &Index, jobs: usize) -> Result<BuildReport, AjumError> {
        self.run(Database::new(), index, jobs).await
    }

    /// Extends `existing` with the reviews of `index` it does not hold yet
    ///
    /// Pairs already in the database are neither fetched nor touched. New
    /// review IDs of a known ISBN are appended to its records.
    pub async fn update(
        &self,
        existing: Database,
        index: &Index,
        jobs: usize,
    ) -> Result<BuildReport, AjumError> {
        self.run(existing, index, jobs).await
    }

    async fn run(
        &self,
        mut database: Database,
        index: &Index,
        jobs: usize,
    ) -> Result<BuildReport, AjumError> {
        let mut units: Vec<(String, ReviewId)> = Vec::new();
        let mut skipped = 0;
        for (isbn, ids) in index.iter() {
            for id in ids {
                if database.contains(isbn, id) {
                    skipped += 1;
                } else {
                    units.push((isbn.clone(), id.clone()));
                }
            }
        }

        tracing::info!(
            "Fetching {} reviews with {} worker(s) ({} already present)",
            units.len(),
            jobs,
            skipped
        );

        let mut failures = FailureReport::new();
        let mut merged = 0;
        for outcome in self.pipeline.reviews(units, jobs).await? {
            match outcome.result {
                Ok(record) => {
                    if database.merge_record(outcome.key, record) {
                        merged += 1;
                    }
                }
                Err(kind) => {
                    if kind != FailureKind::Cancelled {
                        tracing::warn!(
                            "Review {} (ISBN {}) failed: {}",
                            outcome.review_id,
                            outcome.key,
                            kind
                        );
                    }
                    failures
                        .entry(outcome.review_id)
                        .or_insert_with(|| Failure {
                            isbns: Vec::new(),
                            kind,
                        })
                        .isbns
                        .push(outcome.key);
                }
            }
        }

        tracing::info!(
            "Merged {} reviews, {} failed",
            merged,
            failures.len()
        );

        Ok(BuildReport {
            database,
            failures,
            merged,
            skipped,
        })
    }
}
