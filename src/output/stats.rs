//! Statistics over the local files
//!
//! This module provides functionality for summarizing the index file, the
//! database file and the cache directory for the `stats` command.

use crate::cache::{Cache, CacheStats};
use crate::config::PathsConfig;
use crate::storage::{Database, Index};
use crate::AjumError;
use std::path::Path;

/// Index file summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStatistics {
    pub isbns: usize,
    /// Distinct review IDs
    pub reviews: usize,
}

/// Database file summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStatistics {
    pub isbns: usize,
    pub reviews: usize,
    /// Reviews of Wolgast prize laureates
    pub laureates: usize,
}

/// Local data summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    /// None if the index file does not exist yet
    pub index: Option<IndexStatistics>,

    /// None if the database file does not exist yet
    pub database: Option<DatabaseStatistics>,
    pub cache: CacheStats,
}

impl Statistics {
    /// Reads the configured files and counts the cache entries
    ///
    /// # Returns
    ///
    /// * `Ok(Statistics)` - Missing files are reported as `None`
    /// * `Err(AjumError)` - A file exists but cannot be read or parsed
    pub fn collect(paths: &PathsConfig, cache: &Cache) -> Result<Self, AjumError> {
        let index = if exists(&paths.index_file) {
            let index = Index::load(&paths.index_file)?;
            Some(IndexStatistics {
                isbns: index.isbn_count(),
                reviews: index.unique_review_count(),
            })
        } else {
            None
        };

        let database = if exists(&paths.db_file) {
            let database = Database::load(&paths.db_file)?;
            Some(DatabaseStatistics {
                isbns: database.isbn_count(),
                reviews: database.review_count(),
                laureates: database.records().filter(|(_, r)| r.laureate).count(),
            })
        } else {
            None
        };

        Ok(Self {
            index,
            database,
            cache: cache.stats()?,
        })
    }
}

fn exists(path: &Path) -> bool {
    path.is_file()
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &Statistics) {
    println!("=== Local Data ===\n");

    println!("Index:");
    match &stats.index {
        Some(index) => {
            println!("  ISBNs: {}", index.isbns);
            println!("  Reviews: {}", index.reviews);
        }
        None => println!("  (not built yet)"),
    }
    println!();

    println!("Database:");
    match &stats.database {
        Some(db) => {
            let share = if db.reviews > 0 {
                (db.laureates as f64 / db.reviews as f64) * 100.0
            } else {
                0.0
            };
            println!("  ISBNs: {}", db.isbns);
            println!("  Reviews: {}", db.reviews);
            println!("  Wolgast laureates: {} ({:.1}%)", db.laureates, share);
        }
        None => println!("  (not built yet)"),
    }
    println!();

    println!("Cache:");
    println!("  Pages: {}", stats.cache.positive);
    println!("  Known failures: {}", stats.cache.negative);
    if stats.cache.corrupt > 0 {
        println!("  Unreadable entries: {}", stats.cache.corrupt);
    }
    println!("  Size: {:.1} MiB", stats.cache.bytes as f64 / (1024.0 * 1024.0));
}
