//! On-disk page cache
//!
//! One JSON file per request identity, named by [`CacheKey::file_name`].
//! A file holds either a positive entry (the fetched value) or a negative
//! entry recording a permanent failure, so futile requests are not repeated.
//! Entries never expire; [`Cache::clear`] removes them and
//! [`Cache::refresh`] overwrites a single one.
//!
//! Concurrent lookups of the same key within one process are serialized by a
//! per-key lock, so only one of them reaches the network. Writes go through a
//! temp file and a rename, so concurrent writers from separate processes can
//! only ever replace a complete entry with another complete entry.

mod key;

pub use key::CacheKey;

use crate::state::FailureKind;
use crate::FetchError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors returned by cache lookups
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache directory cannot be created, listed or written
    #[error("cache directory {path} is not usable: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A negative entry exists for this key
    #[error("cached failure for {key}: {kind}")]
    Negative { key: String, kind: FailureKind },

    /// No entry existed and computing the value failed
    #[error("fetching {key} failed: {kind}")]
    Failed { key: String, kind: FailureKind },
}

impl CacheError {
    /// The per-unit failure behind this error, or None for resource errors
    pub fn failure(&self) -> Option<&FailureKind> {
        match self {
            Self::Negative { kind, .. } | Self::Failed { kind, .. } => Some(kind),
            Self::Io { .. } => None,
        }
    }
}

/// Content of one cache file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CacheEntry<T> {
    Positive {
        key: String,
        stored_at: DateTime<Utc>,
        value: T,
    },
    Negative {
        key: String,
        stored_at: DateTime<Utc>,
        failure: FailureKind,
    },
}

/// Entry counts of a cache directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub positive: usize,
    pub negative: usize,
    /// Files that are not readable cache entries
    pub corrupt: usize,
    pub bytes: u64,
}

/// Only the tag is needed to count entries
#[derive(Deserialize)]
struct EntryStatus {
    status: String,
}

/// Content-addressed page cache rooted at one directory
#[derive(Debug)]
pub struct Cache {
    dir: PathBuf,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Claim on the per-key lock of one lookup
///
/// Dropping it, including when the lookup future is dropped half-way, removes
/// the map entry once no other lookup holds the same key.
struct InFlight<'a> {
    cache: &'a Cache,
    name: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .cache
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one held here: nobody else is waiting.
        if Arc::strong_count(&self.lock) <= 2 {
            in_flight.remove(&self.name);
        }
    }
}

impl Cache {
    /// Opens (and creates if needed) the cache directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;

        Ok(Self {
            dir,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`, whether or not it exists
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Returns the cached value for `key`, computing and storing it on a miss
    ///
    /// # Behaviour
    ///
    /// | Cache file | Action |
    /// |------------|--------|
    /// | positive entry | return the value, `compute` is not called |
    /// | negative entry | `Err(Negative)`, `compute` is not called |
    /// | missing | call `compute` |
    /// | unreadable | log a warning, treat as missing |
    ///
    /// When `compute` fails with a permanent error (HTTP 4xx) a negative
    /// entry is written. Retryable failures are returned without being
    /// stored, so a later run tries again.
    ///
    /// # Errors
    ///
    /// * `CacheError::Negative` / `CacheError::Failed` - per-unit failures
    /// * `CacheError::Io` - the entry could not be written
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &CacheKey, compute: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let in_flight = self.key_lock(key.file_name());
        let _guard = in_flight.lock.lock().await;

        let path = self.path_for(key);
        match self.read_entry::<T>(&path) {
            Some(CacheEntry::Positive { value, .. }) => {
                tracing::debug!("Cache hit for {}", key.identity());
                return Ok(value);
            }
            Some(CacheEntry::Negative { failure, .. }) => {
                tracing::debug!("Negative cache hit for {}: {}", key.identity(), failure);
                return Err(CacheError::Negative {
                    key: key.identity(),
                    kind: failure,
                });
            }
            None => tracing::debug!("Cache miss for {}", key.identity()),
        }

        self.compute_and_store(key, &path, compute).await
    }

    /// Computes the value for `key` and overwrites whatever entry exists
    ///
    /// For pages whose content changes over time. A failure leaves the old
    /// entry in place; only a permanent one replaces it with a negative entry.
    ///
    /// # Errors
    ///
    /// * `CacheError::Failed` - `compute` failed
    /// * `CacheError::Io` - the entry could not be written
    pub async fn refresh<T, F, Fut>(&self, key: &CacheKey, compute: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let in_flight = self.key_lock(key.file_name());
        let _guard = in_flight.lock.lock().await;

        tracing::debug!("Refreshing {}", key.identity());
        self.compute_and_store(key, &self.path_for(key), compute).await
    }

    async fn compute_and_store<T, F, Fut>(
        &self,
        key: &CacheKey,
        path: &Path,
        compute: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let identity = key.identity();
        match compute().await {
            Ok(value) => {
                let entry = CacheEntry::Positive {
                    key: identity,
                    stored_at: Utc::now(),
                    value: &value,
                };
                self.write_entry(path, &entry)?;
                Ok(value)
            }
            Err(err) => {
                let kind = FailureKind::from(err);
                if kind.is_permanent() {
                    let entry: CacheEntry<&T> = CacheEntry::Negative {
                        key: identity.clone(),
                        stored_at: Utc::now(),
                        failure: kind.clone(),
                    };
                    self.write_entry(path, &entry)?;
                }
                Err(CacheError::Failed {
                    key: identity,
                    kind,
                })
            }
        }
    }

    /// Reads an entry; anything unreadable counts as absent
    fn read_entry<T: DeserializeOwned>(&self, path: &Path) -> Option<CacheEntry<T>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Unreadable cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(
                    "Corrupt cache entry {}, recomputing: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    fn write_entry<T: Serialize>(&self, path: &Path, entry: &CacheEntry<T>) -> Result<(), CacheError> {
        let io_err = |source: std::io::Error| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };

        let bytes = serde_json::to_vec(entry).map_err(|e| io_err(std::io::Error::from(e)))?;
        let mut temp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        temp.write_all(&bytes).map_err(io_err)?;
        temp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    fn key_lock(&self, name: String) -> InFlight<'_> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let lock = in_flight.entry(name.clone()).or_default().clone();
        InFlight {
            cache: self,
            name,
            lock,
        }
    }

    /// Removes every entry, leaving the (empty) directory in place
    ///
    /// Returns the number of removed files.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let io_err = |source: std::io::Error| CacheError::Io {
            path: self.dir.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path).map_err(io_err)?;
            } else {
                std::fs::remove_file(&path).map_err(io_err)?;
            }
            removed += 1;
        }

        tracing::info!("Removed {} cache entries from {}", removed, self.dir.display());
        Ok(removed)
    }

    /// Counts entries by status
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let io_err = |source: std::io::Error| CacheError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut stats = CacheStats::default();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let metadata = entry.metadata().map_err(io_err)?;
            if !metadata.is_file() {
                continue;
            }
            stats.bytes += metadata.len();

            let status = std::fs::read(entry.path())
                .ok()
                .and_then(|bytes| serde_json::from_slice::<EntryStatus>(&bytes).ok());
            match status.as_ref().map(|s| s.status.as_str()) {
                Some("positive") => stats.positive += 1,
                Some("negative") => stats.negative += 1,
                _ => stats.corrupt += 1,
            }
        }

        Ok(stats)
    }
}
