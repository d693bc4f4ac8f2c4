//! Persisted copy of the last good control response.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Storage for the last good response body, kept verbatim.
pub trait ResponseCache: Send + Sync {
    /// Returns the stored body, or `None` if nothing was stored yet.
    fn load(&self) -> io::Result<Option<Vec<u8>>>;

    /// Replaces the stored body.
    fn store(&self, body: &[u8]) -> io::Result<()>;
}

/// Cache backed by a single file on disk.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResponseCache for FileCache {
    fn load(&self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, body: &[u8]) -> io::Result<()> {
        // Write-then-rename so a crash never leaves a truncated cache behind.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)
    }
}

/// In-memory cache, for tests and for running without a writable disk.
#[derive(Debug, Default)]
pub struct MemoryCache {
    body: Mutex<Option<Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseCache for MemoryCache {
    fn load(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self
            .body
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store(&self, body: &[u8]) -> io::Result<()> {
        *self.body.lock().unwrap_or_else(PoisonError::into_inner) = Some(body.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_cache_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("porssari.json"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn file_cache_round_trips_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("porssari.json"));
        let body = br#"{"controls": [ ]}  "#;
        cache.store(body).unwrap();
        assert_eq!(cache.load().unwrap().as_deref(), Some(&body[..]));

        cache.store(b"{}").unwrap();
        assert_eq!(cache.load().unwrap().as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn memory_cache_replaces_body() {
        let cache = MemoryCache::new();
        assert!(cache.load().unwrap().is_none());
        cache.store(b"a").unwrap();
        cache.store(b"b").unwrap();
        assert_eq!(cache.load().unwrap(), Some(b"b".to_vec()));
    }
}
