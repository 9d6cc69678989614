//! Error taxonomy for the file store.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::id::FileId;

/// Errors surfaced by the catalog, the allocator and the file store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Identifier never reserved, not yet completed, or completed empty.
    #[error("file not found: {0}")]
    NotFound(String),

    /// Creating or filling the backing file failed. The reservation stays.
    #[error("failed to write file {id}: {source}")]
    Write {
        id: FileId,
        #[source]
        source: io::Error,
    },

    #[error("failed to create store directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The on-disk catalog exists but cannot be read or parsed.
    #[error("catalog at {} is unreadable: {source}", path.display())]
    CatalogCorrupt {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("catalog I/O failed at {}: {source}", path.display())]
    CatalogIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("identifier {0} is already reserved")]
    DuplicateId(FileId),

    #[error("identifier {0} was never reserved")]
    UnknownId(FileId),

    #[error("failed to start identifier allocator: {0}")]
    AllocatorSpawn(#[source] io::Error),

    #[error("identifier allocator has stopped")]
    AllocatorStopped,

    #[error("catalog lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// True for the lookup miss case, which callers treat as a client error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// The identifier a failed write had already claimed, if any.
    pub fn reserved_id(&self) -> Option<&FileId> {
        match self {
            StoreError::Write { id, .. } => Some(id),
            _ => None,
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
