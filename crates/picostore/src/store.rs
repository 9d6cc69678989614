//! FileStore: random-id file storage on the local filesystem.
//!
//! Layout:
//! ```text
//! {base_path}/
//! ├── raw/
//! │   ├── 3f2a9c...   # uploaded bytes, named by id
//! │   └── 81be04...
//! └── db              # catalog: {id: {path, uploaded, size, mime_type}}
//! ```

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::allocator::IdAllocator;
use crate::catalog::{Catalog, CatalogStats};
use crate::config::StoreConfig;
use crate::descriptor::FileDescriptor;
use crate::error::{Result, StoreError};
use crate::id::FileId;

/// What the HTTP gateway needs from a store.
pub trait Store: Send + Sync {
    /// Copy `reader` into a new file and return its identifier.
    fn store_file(&self, reader: &mut dyn Read) -> Result<FileId> {
        self.store_file_as(reader, None)
    }

    /// Like [`Store::store_file`], recording a content type for later serving.
    fn store_file_as(&self, reader: &mut dyn Read, mime_type: Option<&str>) -> Result<FileId>;

    /// Filesystem path of a completed, non-empty upload.
    ///
    /// Unknown ids, pending reservations and zero-byte uploads are all
    /// `NotFound`.
    fn file_path(&self, id: &str) -> Result<PathBuf>;

    /// Descriptor of a completed, non-empty upload. Same rules as `file_path`.
    fn describe(&self, id: &str) -> Result<FileDescriptor>;

    /// Entry counts, for health reporting.
    fn stats(&self) -> Result<CatalogStats>;
}

/// Filesystem-backed store.
#[derive(Debug)]
pub struct FileStore {
    config: StoreConfig,
    catalog: Arc<Catalog>,
    allocator: IdAllocator,
}

impl FileStore {
    /// Open the store described by `config`.
    ///
    /// Creates the raw directory, loads the catalog and starts the id
    /// allocator. An unreadable catalog is an error; the store is not usable
    /// on metadata it cannot trust.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let raw_dir = config.raw_dir();
        fs::create_dir_all(&raw_dir).map_err(|source| StoreError::CreateDir {
            path: raw_dir.clone(),
            source,
        })?;

        let catalog = Arc::new(Catalog::load(config.catalog_path())?);
        let allocator = IdAllocator::start(catalog.clone())?;

        tracing::info!(
            store = %config.base_path.display(),
            entries = catalog.len()?,
            "file store ready"
        );

        Ok(Self {
            config,
            catalog,
            allocator,
        })
    }

    /// Open a store rooted at `path`.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(StoreConfig::with_base_path(path))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Pick up uploads another node wrote to the replicated catalog.
    pub fn refresh(&self) -> Result<usize> {
        self.catalog.refresh()
    }

    fn raw_path(&self, id: &FileId) -> PathBuf {
        self.config.raw_dir().join(id.as_str())
    }

    fn resolve(&self, id: &str) -> Result<(FileId, FileDescriptor)> {
        let not_found = || StoreError::NotFound(id.to_string());
        let file_id = FileId::parse(id).map_err(|_| not_found())?;
        match self.catalog.lookup(&file_id)? {
            Some(desc) if desc.is_resolvable() => Ok((file_id, desc)),
            _ => Err(not_found()),
        }
    }
}

impl Store for FileStore {
    fn store_file_as(&self, reader: &mut dyn Read, mime_type: Option<&str>) -> Result<FileId> {
        let id = self.allocator.next()?;
        let path = self.raw_path(&id);
        let write_err = |source| StoreError::Write {
            id: id.clone(),
            source,
        };

        // a failed write keeps its reservation and whatever bytes landed
        let mut file = File::create(&path).map_err(write_err)?;
        let written = io::copy(reader, &mut file).map_err(write_err)?;
        drop(file);

        self.catalog.complete(
            &id,
            &path,
            written,
            Utc::now(),
            mime_type.map(str::to_owned),
        )?;
        self.catalog.flush()?;

        tracing::debug!(%id, size = written, "stored file");
        Ok(id)
    }

    fn file_path(&self, id: &str) -> Result<PathBuf> {
        let (file_id, _) = self.resolve(id)?;
        Ok(self.raw_path(&file_id))
    }

    fn describe(&self, id: &str) -> Result<FileDescriptor> {
        self.resolve(id).map(|(_, desc)| desc)
    }

    fn stats(&self) -> Result<CatalogStats> {
        self.catalog.stats()
    }
}
