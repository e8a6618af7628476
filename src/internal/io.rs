// Whole-document store collaborator.
//
// The codec itself never streams: it reads an entire document as one string
// and writes an entire document as one string. This module defines that
// contract and a filesystem implementation of it.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::internal::error::{Error, Result};

/// Whole-document read/replace contract consumed by the codec constructors
/// and the store-backed encode/decode operations.
pub trait DocumentStore {
    /// Reads the full content of the document at `path` as one string.
    fn read_document(&self, path: &Path) -> Result<String>;

    /// Atomically replaces the content of the document at `path`.
    fn write_document(&self, path: &Path, contents: &str) -> Result<()>;
}

/// Filesystem-backed document store. Writes go to a sibling temporary file
/// first and are renamed over the target, so readers never observe a
/// half-written document.
#[derive(Debug, Default)]
pub struct FileStore;

impl FileStore {
    /// Creates a new filesystem document store.
    pub fn new() -> Self {
        Self
    }

    fn staging_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        path.with_file_name(name)
    }
}

impl DocumentStore for FileStore {
    fn read_document(&self, path: &Path) -> Result<String> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::DocumentError(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        debug!("read document '{}' ({} bytes)", path.display(), contents.len());
        Ok(contents)
    }

    fn write_document(&self, path: &Path, contents: &str) -> Result<()> {
        let staging = Self::staging_path(path);
        fs::write(&staging, contents).map_err(|e| {
            Error::DocumentError(format!("Failed to stage '{}': {}", staging.display(), e))
        })?;
        fs::rename(&staging, path).map_err(|e| {
            // Leave no stale staging file behind on a failed rename.
            let _ = fs::remove_file(&staging);
            Error::DocumentError(format!("Failed to replace '{}': {}", path.display(), e))
        })?;
        debug!("replaced document '{}' ({} bytes)", path.display(), contents.len());
        Ok(())
    }
}
