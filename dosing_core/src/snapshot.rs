//! Atomic JSON snapshots for host-owned records.
//!
//! The CLI keeps each regimen and inventory as a small JSON file. Writes go
//! to a temp file in the same directory, are synced, then renamed over the
//! original, so a crash never leaves a half-written record behind.

use crate::{Error, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Load a record, `None` if the file does not exist.
///
/// A file that exists but does not parse is an error; records are never
/// silently replaced with defaults.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    let value = serde_json::from_str(&contents)?;
    tracing::debug!("Loaded snapshot from {:?}", path);
    Ok(Some(value))
}

/// Load a record that must exist
pub fn load_required<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    load(path)?.ok_or_else(|| Error::NotFound(format!("{} at {}", what, path.display())))
}

/// Save a record atomically
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "snapshot path missing parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string_pretty(value)?;
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Saved snapshot to {:?}", path);
    Ok(())
}

/// Load, modify and save a record that must exist
pub fn update<T, F>(path: &Path, what: &str, f: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&mut T) -> Result<()>,
{
    let mut value: T = load_required(path, what)?;
    f(&mut value)?;
    save(path, &value)?;
    Ok(value)
}
