//! ajum-index: a polite indexing and caching client for the AJuM review database
//!
//! This crate walks the remote search results to build an ISBN → review index,
//! fetches and parses individual review pages through an on-disk cache, and
//! merges the parsed records into a local JSON database keyed by ISBN.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod isbn;
pub mod output;
pub mod state;
pub mod storage;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ajum-index operations
///
/// Only resource-level failures end up here. Failures of a single page or
/// review are reported per unit as [`state::FailureKind`] instead.
#[derive(Debug, Error)]
pub enum AjumError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] crawler::ParseError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Required file not found: {path}")]
    MissingFile { path: PathBuf },

    #[error("Review {id} unavailable: {kind}")]
    Unavailable {
        id: storage::ReviewId,
        kind: state::FailureKind,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Failure of a single outbound request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network failure, timeout or unreadable body
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The server answered with a non-2xx status
    #[error("HTTP status {status}")]
    Http { status: u16 },
}

impl FetchError {
    /// Transport failures and 5xx responses may succeed on a later attempt;
    /// 4xx responses never will.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http { status } => *status >= 500,
        }
    }
}

/// Result type alias for ajum-index operations
pub type Result<T> = std::result::Result<T, AjumError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Coordinator;
pub use state::FailureKind;
pub use storage::{Database, Index, ReviewId, ReviewRecord};
