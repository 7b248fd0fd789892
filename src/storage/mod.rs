//! Storage module for the durable artifacts of a run
//!
//! This module handles:
//! - The review identifier and parsed review record types
//! - The ISBN → review ID index produced by the indexer
//! - The ISBN → review record database produced by the builder
//! - Atomic JSON persistence (write to a temp file, then rename)

mod database;
mod index;
mod record;

pub use database::Database;
pub use index::Index;
pub use record::{ReviewId, ReviewRecord};

use crate::AjumError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Reads and deserializes a JSON file
///
/// # Returns
///
/// * `Ok(T)` - Successfully parsed content
/// * `Err(AjumError::MissingFile)` - The file does not exist
/// * `Err(AjumError::Json)` - The file is not valid JSON for `T`
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AjumError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AjumError::MissingFile {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_reader(BufReader::new(file)).map_err(|source| AjumError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serializes `value` as pretty JSON and atomically replaces `path`
///
/// The content is written to a temporary file in the same directory and
/// renamed over the target, so a crash mid-write leaves the previous version
/// intact. Missing parent directories are created.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AjumError> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(&dir)?;

    let mut temp = NamedTempFile::new_in(&dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| AjumError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// Directory a file lives in, `.` for bare file names
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
