//! Durable JSON files.
//!
//! Writes go through a temporary file in the target directory which is
//! synced to disk and then renamed over the target, so a reader never sees
//! a partially written file. A missing file reads as `None`.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::StubsenseError;

pub(crate) fn read_json<T>(path: &Path) -> Result<Option<T>, StubsenseError>
where
    T: DeserializeOwned,
{
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };

    let deserializer = &mut serde_json::Deserializer::from_str(&content);
    let value = serde_path_to_error::deserialize(deserializer).map_err(|err| {
        StubsenseError::CorruptFile {
            file: path.to_path_buf(),
            path: err.path().to_string(),
            error: err.into_inner(),
        }
    })?;

    Ok(Some(value))
}

pub(crate) fn write_json_atomic<T>(path: &Path, value: &T) -> Result<(), StubsenseError>
where
    T: Serialize + ?Sized,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut contents = serde_json::to_vec_pretty(value)?;
    contents.push(b'\n');

    let mut file = tempfile::Builder::new()
        .prefix(".stubsense-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    file.write_all(&contents)?;
    file.as_file().sync_all()?;

    file.persist(path)
        .map_err(|err| StubsenseError::PersistError {
            file: path.to_path_buf(),
            error: err.error,
        })?;
    debug!(path = %path.display(), bytes = contents.len(), "file written");

    Ok(())
}

pub(crate) fn remove_file(path: &Path) -> Result<(), StubsenseError> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != ErrorKind::NotFound => Err(error.into()),
        _ => Ok(()),
    }
}
