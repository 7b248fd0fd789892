//! ISBN → review index from the remote search results
//!
//! Page 1 is always fetched first. When it announces the total number of
//! hits, the remaining pages are known up front and go through the worker
//! pool. Otherwise pages are walked one by one until a page adds nothing new.
//! A failed page only loses its own entries.

use crate::crawler::parser::ListingEntry;
use crate::crawler::pipeline::{settle, Pipeline, UnitError};
use crate::crawler::pool::WorkerPool;
use crate::crawler::query::{page_count, SearchQuery};
use crate::isbn;
use crate::state::FailureKind;
use crate::storage::{Index, ReviewId};
use crate::AjumError;
use std::collections::HashSet;
use std::sync::Arc;

/// Consecutive failed pages after which a sequential walk gives up
const MAX_CONSECUTIVE_FAILURES: usize = 3;

/// Every hit of a search, in page order
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Hits with duplicates across pages removed
    pub entries: Vec<ListingEntry>,

    /// Total number of hits announced by the site, if any
    pub announced: Option<usize>,

    /// Pages (1-based) whose entries are missing
    pub failed_pages: Vec<usize>,

    /// Pages skipped because of a shutdown request
    pub cancelled_pages: usize,
}

impl Listing {
    pub fn review_ids(&self) -> Vec<ReviewId> {
        self.entries.iter().map(|e| e.review_id.clone()).collect()
    }

    fn push_page(&mut self, seen: &mut HashSet<ReviewId>, entries: Vec<ListingEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            if seen.insert(entry.review_id.clone()) {
                self.entries.push(entry);
                added += 1;
            }
        }
        added
    }
}

/// Result of an indexing run
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    /// Entries found by this run
    pub index: Index,
    pub isbn_total: usize,
    pub review_total: usize,

    /// (ISBN, review) pairs dropped for a bad checksum in strict mode
    pub skipped_invalid: usize,

    /// Reviews for which no ISBN could be determined
    pub unresolved: usize,
    pub failed_pages: Vec<usize>,
    pub cancelled: usize,
}

pub struct Indexer {
    pipeline: Pipeline,
}

impl Indexer {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Builds an index of every hit of `query`
    ///
    /// # Arguments
    ///
    /// * `query` - search to walk; [`SearchQuery::all`] indexes the whole site
    /// * `strict` - drop ISBNs that fail the checksum instead of keeping them
    /// * `jobs` - number of concurrent workers
    ///
    /// # Errors
    ///
    /// Only a broken cache directory aborts the run. Failed pages and
    /// reviews are counted in the report.
    pub async fn build_index(
        &self,
        query: &SearchQuery,
        strict: bool,
        jobs: usize,
    ) -> Result<IndexReport, AjumError> {
        let listing = self.walk(query, jobs).await?;

        let mut pairs: Vec<(String, ReviewId)> = Vec::new();
        let mut missing: Vec<((), ReviewId)> = Vec::new();
        for entry in &listing.entries {
            match &entry.isbn {
                Some(isbn) => pairs.push((isbn.clone(), entry.review_id.clone())),
                None => missing.push(((), entry.review_id.clone())),
            }
        }

        let mut unresolved = 0;
        let mut cancelled = listing.cancelled_pages;
        if !missing.is_empty() {
            tracing::info!("Resolving ISBNs of {} reviews from their pages", missing.len());
            for outcome in self.pipeline.reviews(missing, jobs).await? {
                match outcome.result {
                    Ok(record) if !record.isbns.is_empty() => {
                        for isbn in record.isbns {
                            pairs.push((isbn, outcome.review_id.clone()));
                        }
                    }
                    Ok(_) => {
                        tracing::warn!("Review {} lists no ISBN", outcome.review_id);
                        unresolved += 1;
                    }
                    Err(FailureKind::Cancelled) => cancelled += 1,
                    Err(kind) => {
                        tracing::warn!(
                            "Cannot resolve ISBN of review {}: {}",
                            outcome.review_id,
                            kind
                        );
                        unresolved += 1;
                    }
                }
            }
        }

        let mut index = Index::new();
        let mut skipped_invalid = 0;
        for (raw, review_id) in pairs {
            let isbn = isbn::normalize(&raw);
            if isbn.is_empty() {
                unresolved += 1;
                continue;
            }
            if strict && !isbn::is_valid(&isbn) {
                tracing::debug!("Dropping invalid ISBN {} (review {})", isbn, review_id);
                skipped_invalid += 1;
                continue;
            }
            index.insert(isbn, review_id);
        }

        tracing::info!(
            "Indexed {} reviews under {} ISBNs ({} invalid, {} unresolved)",
            index.unique_review_count(),
            index.isbn_count(),
            skipped_invalid,
            unresolved
        );

        Ok(IndexReport {
            isbn_total: index.isbn_count(),
            review_total: index.unique_review_count(),
            index,
            skipped_invalid,
            unresolved,
            failed_pages: listing.failed_pages,
            cancelled,
        })
    }

    /// Collects every hit of `query` across all result pages
    pub async fn walk(&self, query: &SearchQuery, jobs: usize) -> Result<Listing, AjumError> {
        let mut listing = Listing::default();
        let mut seen = HashSet::new();

        let first = match self.pipeline.search_page(query, 0).await {
            Ok(page) => page,
            Err(UnitError::Failed(kind)) => {
                tracing::warn!("Results page 1 failed: {}", kind);
                listing.failed_pages.push(1);
                return Ok(listing);
            }
            Err(UnitError::Fatal(err)) => return Err(err.into()),
        };

        listing.announced = first.total;
        let found = listing.push_page(&mut seen, first.entries);

        match first.total {
            Some(total) => {
                let pages = page_count(total);
                tracing::info!("{} hits on {} results pages", total, pages);
                self.walk_known(query, pages, jobs, &mut listing, &mut seen)
                    .await?;
            }
            None if found > 0 => {
                tracing::info!("No hit count announced, walking results pages sequentially");
                self.walk_sequential(query, &mut listing, &mut seen).await?;
            }
            None => {}
        }

        if listing.announced.is_some_and(|n| n != listing.entries.len()) {
            tracing::debug!(
                "Site announced {:?} hits, collected {}",
                listing.announced,
                listing.entries.len()
            );
        }
        Ok(listing)
    }

    async fn walk_known(
        &self,
        query: &SearchQuery,
        pages: usize,
        jobs: usize,
        listing: &mut Listing,
        seen: &mut HashSet<ReviewId>,
    ) -> Result<(), AjumError> {
        let pool = WorkerPool::new(jobs, self.pipeline.shutdown().clone());
        let query = Arc::new(query.clone());

        let tasks = (1..pages).map(|page| {
            let pipeline = self.pipeline.clone();
            let query = Arc::clone(&query);
            (page, move || async move { pipeline.search_page(&query, page).await })
        });

        for finished in pool.run(tasks).await {
            let number = finished.key + 1;
            match settle(finished.outcome)? {
                Ok(page) => {
                    listing.push_page(seen, page.entries);
                }
                Err(FailureKind::Cancelled) => listing.cancelled_pages += 1,
                Err(kind) => {
                    tracing::warn!("Results page {} failed: {}", number, kind);
                    listing.failed_pages.push(number);
                }
            }
        }
        Ok(())
    }

    async fn walk_sequential(
        &self,
        query: &SearchQuery,
        listing: &mut Listing,
        seen: &mut HashSet<ReviewId>,
    ) -> Result<(), AjumError> {
        let mut page = 1;
        let mut failures = 0;

        loop {
            if self.pipeline.shutdown().is_triggered() {
                listing.cancelled_pages += 1;
                break;
            }

            match self.pipeline.search_page(query, page).await {
                Ok(found) => {
                    failures = 0;
                    if listing.push_page(seen, found.entries) == 0 {
                        tracing::debug!("Results page {} adds nothing new, stopping", page + 1);
                        break;
                    }
                }
                Err(UnitError::Failed(kind)) => {
                    tracing::warn!("Results page {} failed: {}", page + 1, kind);
                    listing.failed_pages.push(page + 1);
                    failures += 1;
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        tracing::warn!("Giving up after {} failed pages in a row", failures);
                        break;
                    }
                }
                Err(UnitError::Fatal(err)) => return Err(err.into()),
            }
            page += 1;
        }
        Ok(())
    }
}
