//! Crawler module for the review site
//!
//! This module contains the indexing and caching pipeline, including:
//! - Rate-limited HTTP fetching with bounded retry
//! - Listing and review page parsing
//! - A fixed-size worker pool with cooperative shutdown
//! - The indexer, the database builder and the command coordinator

mod builder;
mod coordinator;
mod fetcher;
mod indexer;
mod limiter;
mod parser;
mod pipeline;
mod pool;
mod query;
mod retry;

pub use builder::{BuildReport, DatabaseBuilder};
pub use coordinator::{BackupSummary, Coordinator, IndexSummary, QueryResult};
pub use fetcher::{build_http_client, review_params, HttpTransport, PageFetcher, RawResponse, Transport};
pub use indexer::{IndexReport, Indexer, Listing};
pub use limiter::RateLimiter;
pub use parser::{AjumParser, ListingEntry, ListingPage, ListingParser, ParseError, ReviewParser};
pub use pipeline::{settle, Pipeline, ReviewOutcome, UnitError};
pub use pool::{Outcome, Shutdown, TaskResult, WorkerPool};
pub use query::{page_count, SearchQuery, PAGE_SIZE};
pub use retry::RetryPolicy;
