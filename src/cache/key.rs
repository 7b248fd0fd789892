//! Deterministic cache keys
//!
//! A key's file name is a pure function of the request identity, so the same
//! review or search always maps to the same file across runs and processes.
use crate::storage::ReviewId;
use sha2::{Digest, Sha256};

/// Identity of one cacheable request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Detail page of a single review
    Review(ReviewId),

    /// One search results page, identified by its full parameter set
    Search(Vec<(String, String)>),
}

impl CacheKey {
    /// Creates a search key; parameter order does not matter
    pub fn search<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut params: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        params.sort();
        Self::Search(params)
    }

    /// Canonical textual identity, stored inside every cache file
    ///
    /// Reviews: `review:<id>`. Searches: `search:` followed by the sorted
    /// parameters as `k=v` pairs joined with `&` (not URL-encoded).
    pub fn identity(&self) -> String {
        match self {
            Self::Review(id) => format!("review:{}", id),
            Self::Search(params) => {
                let joined = params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join("&");
                format!("search:{}", joined)
            }
        }
    }

    /// File name of this key inside the cache directory
    ///
    /// Review IDs made of `[A-Za-z0-9_-]` (at most 64 chars) are used
    /// verbatim (`review-<id>.json`) for easy manual inspection. Any other
    /// identity is named by the hex SHA-256 of [`identity`](Self::identity).
    pub fn file_name(&self) -> String {
        match self {
            Self::Review(id) if is_safe_name(id.as_str()) => format!("review-{}.json", id),
            Self::Review(_) => format!("review-{}.json", digest(&self.identity())),
            Self::Search(_) => format!("search-{}.json", digest(&self.identity())),
        }
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
