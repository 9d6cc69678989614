//! Catalog: identifier → descriptor map mirrored to a single JSON document.
//!
//! The map sits behind one `RwLock`. Lookups and the allocator's collision
//! checks share the read side; reservations and completions take the write
//! side. `flush` rewrites the whole document after every completed upload by
//! writing a sibling temp file and renaming it over the catalog.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::descriptor::FileDescriptor;
use crate::error::{Result, StoreError};
use crate::id::FileId;

type Entries = HashMap<FileId, FileDescriptor>;

/// Counts reported by [`Catalog::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total: usize,
    pub completed: usize,
    pub reserved: usize,
}

/// Concurrency-safe catalog bound to a file on disk.
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    entries: RwLock<Entries>,
    /// Serializes writers of the shared temp file.
    flush_lock: Mutex<()>,
}

impl Catalog {
    /// Empty catalog that will flush to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_entries(path, Entries::new())
    }

    fn with_entries(path: impl Into<PathBuf>, entries: Entries) -> Self {
        Self {
            path: path.into(),
            entries: RwLock::new(entries),
            flush_lock: Mutex::new(()),
        }
    }

    /// Load the catalog from `path`.
    ///
    /// A missing file yields an empty catalog. Any other read or parse
    /// failure is `CatalogCorrupt`; no partial recovery is attempted.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match read_document(&path)? {
            Some(entries) => {
                tracing::debug!(path = %path.display(), entries = entries.len(), "catalog loaded");
                Ok(Self::with_entries(path, entries))
            }
            None => {
                tracing::debug!(path = %path.display(), "no catalog on disk, starting empty");
                Ok(Self::new(path))
            }
        }
    }

    /// Rebuild a catalog from a serialized document.
    pub fn restore(path: impl Into<PathBuf>, document: &str) -> Result<Self> {
        let path = path.into();
        let entries = parse_document(document).map_err(|e| StoreError::CatalogCorrupt {
            path: path.clone(),
            source: e.into(),
        })?;
        Ok(Self::with_entries(path, entries))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Entries>> {
        self.entries.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Entries>> {
        self.entries.write().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn lookup(&self, id: &FileId) -> Result<Option<FileDescriptor>> {
        Ok(self.read()?.get(id).cloned())
    }

    pub fn contains(&self, id: &FileId) -> Result<bool> {
        Ok(self.read()?.contains_key(id))
    }

    /// Insert a zero-size placeholder for `id`.
    pub fn reserve(&self, id: &FileId) -> Result<()> {
        let mut entries = self.write()?;
        if entries.contains_key(id) {
            return Err(StoreError::DuplicateId(id.clone()));
        }
        entries.insert(id.clone(), FileDescriptor::reserved(id));
        Ok(())
    }

    /// Replace the placeholder for `id` with its final values.
    pub fn complete(
        &self,
        id: &FileId,
        path: &Path,
        size: u64,
        uploaded: DateTime<Utc>,
        mime_type: Option<String>,
    ) -> Result<()> {
        let mut entries = self.write()?;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownId(id.clone()))?;
        *entry = FileDescriptor::completed(path, size, uploaded, mime_type);
        Ok(())
    }

    /// Serialize the whole map.
    pub fn snapshot(&self) -> Result<String> {
        let entries = self.read()?;
        Ok(serde_json::to_string(&*entries)?)
    }

    /// Rewrite the catalog document with the current map.
    pub fn flush(&self) -> Result<()> {
        let _guard = self.flush_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let json = self.snapshot()?;
        let io_err = |source| StoreError::CatalogIo {
            path: self.path.clone(),
            source,
        };

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json).map_err(io_err)?;
        fs::rename(&temp_path, &self.path).map_err(io_err)?;
        Ok(())
    }

    /// Merge descriptors completed on disk by another writer.
    ///
    /// Entries already completed in memory are left alone; unknown ids and
    /// local placeholders are replaced. Returns the number merged.
    pub fn refresh(&self) -> Result<usize> {
        let Some(on_disk) = read_document(&self.path)? else {
            return Ok(0);
        };

        let mut entries = self.write()?;
        let mut merged = 0;
        for (id, desc) in on_disk {
            if !desc.is_resolvable() {
                continue;
            }
            let stale = !matches!(entries.get(&id), Some(local) if local.is_resolvable());
            if stale {
                entries.insert(id, desc);
                merged += 1;
            }
        }
        Ok(merged)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Completed (servable) entries, sorted by id.
    pub fn completed(&self) -> Result<Vec<(FileId, FileDescriptor)>> {
        let entries = self.read()?;
        let mut done: Vec<_> = entries
            .iter()
            .filter(|(_, desc)| desc.is_resolvable())
            .map(|(id, desc)| (id.clone(), desc.clone()))
            .collect();
        done.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(done)
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let entries = self.read()?;
        let completed = entries.values().filter(|d| d.is_resolvable()).count();
        Ok(CatalogStats {
            total: entries.len(),
            completed,
            reserved: entries.len() - completed,
        })
    }
}

fn parse_document(document: &str) -> serde_json::Result<Entries> {
    // a catalog that has never seen a reservation is written as `null` by
    // some writers; treat it as empty
    let entries: Option<Entries> = serde_json::from_str(document)?;
    Ok(entries.unwrap_or_default())
}

fn read_document(path: &Path) -> Result<Option<Entries>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::CatalogCorrupt {
                path: path.to_path_buf(),
                source: e.into(),
            })
        }
    };

    parse_document(&contents)
        .map(Some)
        .map_err(|e| StoreError::CatalogCorrupt {
            path: path.to_path_buf(),
            source: e.into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn catalog_in(dir: &TempDir) -> Catalog {
        Catalog::new(dir.path().join("db"))
    }

    #[test]
    fn test_reserve_then_lookup() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let catalog = catalog_in(&dir);
        let id = FileId::random();

        catalog.reserve(&id)?;
        let desc = catalog.lookup(&id)?.expect("reserved entry");
        assert_eq!(desc, FileDescriptor::reserved(&id));
        assert!(catalog.contains(&id)?);
        Ok(())
    }

    #[test]
    fn test_reserve_twice_is_rejected() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let catalog = catalog_in(&dir);
        let id = FileId::random();

        catalog.reserve(&id)?;
        let err = catalog.reserve(&id).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(ref dup) if dup == &id));
        Ok(())
    }

    #[test]
    fn test_complete_requires_reservation() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let catalog = catalog_in(&dir);
        let id = FileId::random();

        let err = catalog
            .complete(&id, Path::new("/x"), 3, Utc::now(), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownId(_)));
        assert!(catalog.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_complete_updates_in_place() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let catalog = catalog_in(&dir);
        let id = FileId::random();
        let now = Utc::now();

        catalog.reserve(&id)?;
        catalog.complete(&id, Path::new("/srv/raw/f"), 42, now, Some("image/png".into()))?;

        let desc = catalog.lookup(&id)?.expect("completed entry");
        assert_eq!(desc.path, "/srv/raw/f");
        assert_eq!(desc.size, 42);
        assert_eq!(desc.uploaded, Some(now));
        assert_eq!(desc.mime_type.as_deref(), Some("image/png"));
        assert_eq!(catalog.len()?, 1);
        Ok(())
    }

    #[test]
    fn test_snapshot_restore_keeps_completed() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let catalog = catalog_in(&dir);

        let done = FileId::random();
        catalog.reserve(&done)?;
        catalog.complete(&done, Path::new("/srv/raw/a"), 7, Utc::now(), None)?;
        let pending = FileId::random();
        catalog.reserve(&pending)?;

        let restored = Catalog::restore(catalog.path(), &catalog.snapshot()?)?;
        assert_eq!(restored.completed()?, catalog.completed()?);
        assert_eq!(restored.completed()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_flush_and_load() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("db");
        let id = FileId::random();

        {
            let catalog = Catalog::new(&path);
            catalog.reserve(&id)?;
            catalog.complete(&id, Path::new("/srv/raw/b"), 9, Utc::now(), None)?;
            catalog.flush()?;
        }

        assert!(!path.with_extension("tmp").exists());
        let loaded = Catalog::load(&path)?;
        assert_eq!(loaded.lookup(&id)?.map(|d| d.size), Some(9));
        Ok(())
    }

    #[test]
    fn test_load_missing_file_is_empty() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let catalog = Catalog::load(dir.path().join("db"))?;
        assert!(catalog.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_load_corrupt_file_fails() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("db");
        fs::write(&path, "{\"truncated\": ")?;

        let err = Catalog::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::CatalogCorrupt { .. }));
        Ok(())
    }

    #[test]
    fn test_load_null_document_is_empty() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("db");
        fs::write(&path, "null\n")?;

        assert!(Catalog::load(&path)?.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_refresh_merges_completed_from_disk() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("db");

        let reader = Catalog::load(&path)?;
        assert_eq!(reader.refresh()?, 0);

        let writer = Catalog::new(&path);
        let shipped = FileId::random();
        writer.reserve(&shipped)?;
        writer.complete(&shipped, Path::new("/srv/raw/c"), 5, Utc::now(), None)?;
        let in_flight = FileId::random();
        writer.reserve(&in_flight)?;
        writer.flush()?;

        assert_eq!(reader.refresh()?, 1);
        assert!(reader.lookup(&shipped)?.is_some_and(|d| d.is_resolvable()));
        assert!(reader.lookup(&in_flight)?.is_none());
        // already merged
        assert_eq!(reader.refresh()?, 0);
        Ok(())
    }

    #[test]
    fn test_stats() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let catalog = catalog_in(&dir);
        let a = FileId::random();
        let b = FileId::random();
        catalog.reserve(&a)?;
        catalog.reserve(&b)?;
        catalog.complete(&a, Path::new("/srv/raw/a"), 1, Utc::now(), None)?;

        assert_eq!(
            catalog.stats()?,
            CatalogStats {
                total: 2,
                completed: 1,
                reserved: 1
            }
        );
        Ok(())
    }
}
