//! Per-file metadata kept in the catalog.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::FileId;

/// Catalog entry for one identifier.
///
/// A reservation and a completed zero-byte upload both have `size == 0` and
/// look the same. Only entries with `size > 0` are served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Where the bytes live. For a reservation this is the bare id.
    pub path: String,

    /// Set when the upload completes.
    #[serde(default)]
    pub uploaded: Option<DateTime<Utc>>,

    /// Bytes written.
    #[serde(default)]
    pub size: u64,

    /// Content type declared or guessed at upload time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileDescriptor {
    /// Placeholder inserted when the allocator claims an id.
    pub fn reserved(id: &FileId) -> Self {
        Self {
            path: id.to_string(),
            uploaded: None,
            size: 0,
            mime_type: None,
        }
    }

    pub fn completed(
        path: impl Into<PathBuf>,
        size: u64,
        uploaded: DateTime<Utc>,
        mime_type: Option<String>,
    ) -> Self {
        Self {
            path: path.into().to_string_lossy().into_owned(),
            uploaded: Some(uploaded),
            size,
            mime_type,
        }
    }

    /// Whether a download request may be served from this entry.
    pub fn is_resolvable(&self) -> bool {
        self.size > 0
    }
}
