//! Command coordinator - wires the pipeline for each CLI command
//!
//! This module builds the shared pieces once per invocation:
//! - Rate limiter, transport and page fetcher from the client settings
//! - The page cache in the configured directory
//! - The parser with the configured ID redirects
//!
//! and runs one command on top of them, loading and saving the index and
//! database files around it.

use crate::cache::Cache;
use crate::config::Config;
use crate::crawler::builder::{BuildReport, DatabaseBuilder};
use crate::crawler::fetcher::{HttpTransport, PageFetcher, Transport};
use crate::crawler::indexer::{IndexReport, Indexer};
use crate::crawler::limiter::RateLimiter;
use crate::crawler::parser::AjumParser;
use crate::crawler::pipeline::{Pipeline, UnitError};
use crate::crawler::pool::Shutdown;
use crate::crawler::query::SearchQuery;
use crate::crawler::retry::RetryPolicy;
use crate::output::stats::Statistics;
use crate::state::{Failure, FailureReport};
use crate::storage::{write_json_atomic, Database, Index, ReviewId, ReviewRecord};
use crate::AjumError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Longest pause between two retries of the same page
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Outcome of `index`
#[derive(Debug)]
pub struct IndexSummary {
    pub report: IndexReport,

    /// New (ISBN, review) pairs merged into the index file
    pub added: usize,

    /// ISBNs in the index file after merging
    pub total_isbns: usize,
    pub path: PathBuf,
}

/// Outcome of `backup`
#[derive(Debug)]
pub struct BackupSummary {
    pub path: Option<PathBuf>,
    pub records: usize,
    pub failures: FailureReport,
    pub failed_pages: Vec<usize>,
}

/// Outcome of `query`
#[derive(Debug)]
pub struct QueryResult {
    /// Number of hits found by the search
    pub hits: usize,

    /// Fetched records in listing order (empty when only counting)
    pub records: Vec<ReviewRecord>,
    pub failures: FailureReport,
}

/// Main coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    pipeline: Pipeline,
}

impl Coordinator {
    /// Creates a coordinator talking to the real site
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration with CLI overrides applied
    /// * `shutdown` - Flag set by the ctrl-c handler
    pub fn new(config: Config, shutdown: Shutdown) -> Result<Self, AjumError> {
        let transport = HttpTransport::new(config.client.timeout())?;
        Self::with_transport(config, Arc::new(transport), shutdown)
    }

    /// Creates a coordinator on top of any transport
    pub fn with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
        shutdown: Shutdown,
    ) -> Result<Self, AjumError> {
        let limiter = Arc::new(RateLimiter::from_secs_f64(config.client.timer));
        let fetcher = PageFetcher::new(transport, limiter, &config.client)?;
        let cache = Cache::open(&config.paths.cache_dir)?;

        let redirects = config
            .redirects
            .iter()
            .map(|(from, to)| (from.clone(), to.clone()))
            .collect();
        let parser = AjumParser::with_redirects(redirects);

        let retry = RetryPolicy {
            max_attempts: config.client.max_retries,
            base_delay: config.client.retry_delay(),
            max_delay: MAX_RETRY_DELAY,
        };

        tracing::debug!(
            "Pipeline ready: timer {}s, cache {}, {} worker(s)",
            config.client.timer,
            config.paths.cache_dir.display(),
            config.workers.jobs
        );

        let pipeline = Pipeline::new(
            Arc::new(fetcher),
            Arc::new(cache),
            Arc::new(parser),
            retry,
            shutdown,
        );

        Ok(Self {
            config: Arc::new(config),
            pipeline,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn jobs(&self) -> usize {
        self.config.workers.jobs
    }

    /// Indexes every review of the site and merges the result into `output`
    ///
    /// The index file is only rewritten when the run found something.
    pub async fn index(&self, strict: bool, output: Option<&Path>) -> Result<IndexSummary, AjumError> {
        let path = output.unwrap_or(self.config.paths.index_file.as_path()).to_path_buf();
        let mut index = Index::load_or_default(&path)?;

        let indexer = Indexer::new(self.pipeline.clone());
        let report = indexer
            .build_index(&SearchQuery::all(), strict, self.jobs())
            .await?;

        let added = index.merge(report.index.clone());
        if !report.index.is_empty() {
            index.save(&path)?;
            tracing::info!("Saved index with {} ISBNs to {}", index.isbn_count(), path.display());
        } else {
            tracing::warn!("Nothing indexed, leaving {} untouched", path.display());
        }

        Ok(IndexSummary {
            report,
            added,
            total_isbns: index.isbn_count(),
            path,
        })
    }

    /// Builds a fresh database from the index file
    pub async fn build(
        &self,
        index_file: Option<&Path>,
        db_file: Option<&Path>,
    ) -> Result<BuildReport, AjumError> {
        let index = Index::load(index_file.unwrap_or(self.config.paths.index_file.as_path()))?;
        let builder = DatabaseBuilder::new(self.pipeline.clone());
        let report = builder.build(&index, self.jobs()).await?;

        self.save_database(&report.database, db_file.unwrap_or(self.config.paths.db_file.as_path()))?;
        Ok(report)
    }

    /// Adds the reviews of the index file that the database lacks
    pub async fn update(&self) -> Result<BuildReport, AjumError> {
        let index = Index::load(&self.config.paths.index_file)?;
        let existing = Database::load_or_default(&self.config.paths.db_file)?;

        let builder = DatabaseBuilder::new(self.pipeline.clone());
        let report = builder.update(existing, &index, self.jobs()).await?;

        if report.merged > 0 {
            self.save_database(&report.database, &self.config.paths.db_file)?;
        } else {
            tracing::info!("Database is up to date");
        }
        Ok(report)
    }

    fn save_database(&self, database: &Database, path: &Path) -> Result<(), AjumError> {
        if database.is_empty() {
            tracing::warn!("Database is empty, leaving {} untouched", path.display());
            return Ok(());
        }
        database.save(path)?;
        tracing::info!(
            "Saved {} reviews under {} ISBNs to {}",
            database.review_count(),
            database.isbn_count(),
            path.display()
        );
        Ok(())
    }

    /// Snapshots every review of the site into a timestamped file
    ///
    /// # Arguments
    ///
    /// * `archived` - include reviews the site has moved to its archive
    pub async fn backup(&self, archived: bool) -> Result<BackupSummary, AjumError> {
        let query = if archived {
            SearchQuery::everything()
        } else {
            SearchQuery::all()
        };

        let listing = Indexer::new(self.pipeline.clone())
            .walk(&query, self.jobs())
            .await?;
        let units = listing.review_ids().into_iter().map(|id| ((), id)).collect();
        let (records, failures) = self.fetch_records(units).await?;

        let snapshot: BTreeMap<ReviewId, ReviewRecord> = records
            .into_iter()
            .map(|record| (record.review_id.clone(), record))
            .collect();

        let path = if snapshot.is_empty() {
            tracing::warn!("No reviews fetched, skipping backup file");
            None
        } else {
            let name = format!("backup-{}.json", chrono::Local::now().format("%Y%m%d-%H%M%S"));
            let path = self.config.paths.backup_dir.join(name);
            write_json_atomic(&path, &snapshot)?;
            tracing::info!("Wrote {} reviews to {}", snapshot.len(), path.display());
            Some(path)
        };

        Ok(BackupSummary {
            path,
            records: snapshot.len(),
            failures,
            failed_pages: listing.failed_pages,
        })
    }

    /// Fetches and parses a single review
    pub async fn show(&self, id: &ReviewId) -> Result<ReviewRecord, AjumError> {
        match self.pipeline.review(id).await {
            Ok(record) => Ok(record),
            Err(UnitError::Failed(kind)) => Err(AjumError::Unavailable {
                id: id.clone(),
                kind,
            }),
            Err(UnitError::Fatal(err)) => Err(err.into()),
        }
    }

    /// Runs a remote search and fetches its hits
    ///
    /// With `count_only` no review page is requested.
    pub async fn query(&self, query: &SearchQuery, count_only: bool) -> Result<QueryResult, AjumError> {
        let listing = Indexer::new(self.pipeline.clone())
            .walk(query, self.jobs())
            .await?;

        if count_only {
            return Ok(QueryResult {
                hits: listing.announced.unwrap_or(listing.entries.len()),
                records: Vec::new(),
                failures: FailureReport::new(),
            });
        }

        let units = listing.review_ids().into_iter().map(|id| ((), id)).collect();
        let (records, failures) = self.fetch_records(units).await?;
        Ok(QueryResult {
            hits: listing.entries.len(),
            records,
            failures,
        })
    }

    async fn fetch_records(
        &self,
        units: Vec<((), ReviewId)>,
    ) -> Result<(Vec<ReviewRecord>, FailureReport), AjumError> {
        let mut records = Vec::new();
        let mut failures = FailureReport::new();
        for outcome in self.pipeline.reviews(units, self.jobs()).await? {
            match outcome.result {
                Ok(record) => records.push(record),
                Err(kind) => {
                    failures.insert(
                        outcome.review_id,
                        Failure {
                            isbns: Vec::new(),
                            kind,
                        },
                    );
                }
            }
        }
        Ok((records, failures))
    }

    /// Empties the cache directory
    pub fn clear(&self) -> Result<usize, AjumError> {
        Ok(self.pipeline.cache().clear()?)
    }

    /// Sizes of the index file, the database file and the cache
    pub fn stats(&self) -> Result<Statistics, AjumError> {
        Statistics::collect(&self.config.paths, self.pipeline.cache())
    }
}
