//! file contents cache keyed by path and modification time
use crate::error::ComposeError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

#[derive(Debug, Clone)]
struct CacheEntry {
    bytes: Arc<[u8]>,
    modified: SystemTime,
}

/// Raw file contents shared by all nested loads of one top-level load
///
/// An entry is only reused while the file's modification time is unchanged.
#[derive(Debug, Default)]
pub struct IncludeCache {
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
    disk_reads: AtomicUsize,
}

impl IncludeCache {
    /// Contents of `path`, read from disk if unknown or modified since it was cached
    pub fn read(&self, path: &Path) -> Result<Arc<[u8]>, ComposeError> {
        let modified = std::fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .map_err(|e| ComposeError::io(path, e))?;

        if let Some(bytes) = self.get(path, modified) {
            tracing::trace!(path=%path.display(), "cache hit");
            return Ok(bytes);
        }

        tracing::debug!(path=%path.display(), "reading file");
        let bytes: Arc<[u8]> = std::fs::read(path)
            .map_err(|e| ComposeError::io(path, e))?
            .into();
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
        self.insert(path, bytes.clone(), modified);

        Ok(bytes)
    }

    /// Cached contents if the entry matches `modified`
    pub fn get(&self, path: &Path, modified: SystemTime) -> Option<Arc<[u8]>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(path)
            .filter(|entry| entry.modified == modified)
            .map(|entry| entry.bytes.clone())
    }

    pub fn insert(&self, path: impl Into<PathBuf>, bytes: Arc<[u8]>, modified: SystemTime) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(path.into(), CacheEntry { bytes, modified });
    }

    pub fn contains(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times a file was actually read from disk
    pub fn disk_reads(&self) -> usize {
        self.disk_reads.load(Ordering::Relaxed)
    }
}
