//! Artifact files on disk.
//!
//! Artifacts are bincode blobs. Writes go to a temporary file in the
//! destination directory which is then renamed over the destination, so an
//! interrupted save never leaves a torn artifact behind.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::error::{DqnError, Result};

/// Atomically replace the file at `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

/// Serialize `value` and atomically write it to `path`, overwriting any previous artifact.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let serialized = bincode::serialize(value)?;
    write_atomic(path, &serialized)
}

/// Read an artifact back. Every failure is reported as [`DqnError::ArtifactLoad`].
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read(path).map_err(|e| DqnError::artifact_load(path, e.to_string()))?;
    bincode::deserialize(&data).map_err(|e| DqnError::artifact_load(path, e.to_string()))
}
