//! Fetch-then-parse units shared by the indexer and the database builder
//!
//! Every page goes through the same path: cache lookup, rate-limited fetch
//! with retry on a miss, then parsing. Raw HTML is what gets cached, so a
//! page that fails to parse stays on disk for inspection and parser fixes
//! never require a refetch.
//!
//! The first results page of a search is the exception. It carries the hit
//! count, so it is always fetched live and its cache entry overwritten.

use crate::cache::{Cache, CacheError, CacheKey};
use crate::crawler::fetcher::{review_params, PageFetcher};
use crate::crawler::parser::{ListingPage, ListingParser, ParseError, ReviewParser};
use crate::crawler::pool::{Outcome, Shutdown, WorkerPool};
use crate::crawler::query::SearchQuery;
use crate::crawler::retry::RetryPolicy;
use crate::state::FailureKind;
use crate::storage::{ReviewId, ReviewRecord};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a unit that did not produce a value
#[derive(Debug, Error)]
pub enum UnitError {
    /// The unit failed on its own; the run goes on
    #[error("{0}")]
    Failed(FailureKind),

    /// A shared resource broke; the run cannot go on
    #[error(transparent)]
    Fatal(CacheError),
}

impl From<CacheError> for UnitError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Negative { kind, .. } | CacheError::Failed { kind, .. } => {
                Self::Failed(kind)
            }
            fatal @ CacheError::Io { .. } => Self::Fatal(fatal),
        }
    }
}

/// Reduces a pool outcome to the unit's own result
///
/// Cancelled and panicked units become failures of their own. Only a broken
/// cache is passed up as an error.
pub fn settle<T>(outcome: Outcome<Result<T, UnitError>>) -> Result<Result<T, FailureKind>, CacheError> {
    match outcome {
        Outcome::Done(Ok(value)) => Ok(Ok(value)),
        Outcome::Done(Err(UnitError::Failed(kind))) => Ok(Err(kind)),
        Outcome::Done(Err(UnitError::Fatal(err))) => Err(err),
        Outcome::Cancelled => Ok(Err(FailureKind::Cancelled)),
        Outcome::Panicked(message) => Ok(Err(FailureKind::Internal { message })),
    }
}

/// Result of fetching one review as part of a batch
#[derive(Debug)]
pub struct ReviewOutcome<K> {
    /// Caller context the review was requested for
    pub key: K,
    pub review_id: ReviewId,
    pub result: Result<ReviewRecord, FailureKind>,
}

/// Shared handles needed to process one page
///
/// Cloning is cheap; every worker unit owns a clone.
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<PageFetcher>,
    cache: Arc<Cache>,
    listings: Arc<dyn ListingParser>,
    reviews: Arc<dyn ReviewParser>,
    retry: RetryPolicy,
    shutdown: Shutdown,
}

impl Pipeline {
    pub fn new<P>(
        fetcher: Arc<PageFetcher>,
        cache: Arc<Cache>,
        parser: Arc<P>,
        retry: RetryPolicy,
        shutdown: Shutdown,
    ) -> Self
    where
        P: ListingParser + ReviewParser + 'static,
    {
        Self {
            fetcher,
            cache,
            listings: parser.clone(),
            reviews: parser,
            retry,
            shutdown,
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Raw HTML of one review page, from the cache or the network
    pub async fn review_page(&self, id: &ReviewId) -> Result<String, UnitError> {
        self.page(CacheKey::Review(id.clone()), review_params(id), id.as_str())
            .await
    }

    /// Fetches and parses one review
    pub async fn review(&self, id: &ReviewId) -> Result<ReviewRecord, UnitError> {
        let html = self.review_page(id).await?;
        self.reviews
            .parse_review(id, &html)
            .map_err(|e| self.parse_failure(&CacheKey::Review(id.clone()), e))
    }

    /// Fetches and parses a batch of reviews on `jobs` workers
    ///
    /// Results come back in the order of `units`. Each unit carries a caller
    /// key (for example the ISBN it was indexed under) that is handed back
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` as soon as a unit reports a broken cache.
    /// Per-review failures are part of the returned outcomes.
    pub async fn reviews<K>(
        &self,
        units: Vec<(K, ReviewId)>,
        jobs: usize,
    ) -> Result<Vec<ReviewOutcome<K>>, CacheError>
    where
        K: Send + 'static,
    {
        let pool = WorkerPool::new(jobs, self.shutdown.clone());
        let tasks = units.into_iter().map(|(key, review_id)| {
            let pipeline = self.clone();
            let id = review_id.clone();
            ((key, review_id), move || async move { pipeline.review(&id).await })
        });

        let mut outcomes = Vec::new();
        for finished in pool.run(tasks).await {
            let (key, review_id) = finished.key;
            let result = settle(finished.outcome)?;
            if let Err(kind) = &result {
                tracing::debug!("Review {} failed: {}", review_id, kind);
            }
            outcomes.push(ReviewOutcome {
                key,
                review_id,
                result,
            });
        }
        Ok(outcomes)
    }

    /// Fetches and parses one page of search results (0-based)
    ///
    /// Page 0 always goes to the network so that new hits show up; later
    /// pages are served from the cache.
    pub async fn search_page(
        &self,
        query: &SearchQuery,
        page: usize,
    ) -> Result<ListingPage, UnitError> {
        let params = query.page_params(page);
        let key = CacheKey::search(params.clone());
        let label = format!("results page {}", page + 1);

        let html = if page == 0 {
            self.live_page(&key, &params, &label).await?
        } else {
            self.page(key.clone(), params, &label).await?
        };
        self.listings
            .parse_listing(&html)
            .map_err(|e| self.parse_failure(&key, e))
    }

    async fn page(
        &self,
        key: CacheKey,
        params: Vec<(String, String)>,
        label: &str,
    ) -> Result<String, UnitError> {
        let fetcher = &self.fetcher;
        let retry = &self.retry;
        let params = &params;

        let html = self
            .cache
            .get_or_fetch(&key, move || {
                retry.run(label, move || fetcher.fetch(params))
            })
            .await?;
        Ok(html)
    }

    async fn live_page(
        &self,
        key: &CacheKey,
        params: &[(String, String)],
        label: &str,
    ) -> Result<String, UnitError> {
        let fetcher = &self.fetcher;
        let retry = &self.retry;

        let html = self
            .cache
            .refresh(key, move || retry.run(label, move || fetcher.fetch(params)))
            .await?;
        Ok(html)
    }

    fn parse_failure(&self, key: &CacheKey, err: ParseError) -> UnitError {
        let raw: PathBuf = self.cache.path_for(key);
        tracing::warn!("Failed to parse {}: {} (raw page: {})", key.identity(), err, raw.display());
        UnitError::Failed(FailureKind::Parse {
            message: err.to_string(),
            raw: Some(raw),
        })
    }
}
