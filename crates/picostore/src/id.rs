//! FileId: an opaque random identifier, 128 bits rendered as 32 hex chars.
//!
//! Ids come from v4 UUIDs with the hyphens stripped. They carry no relation
//! to the content they name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Length of a rendered identifier.
pub const ID_LEN: usize = 32;

/// Identifier assigned to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileId(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid id length: expected 32 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in id")]
    InvalidHex,
}

impl FileId {
    /// Generate a fresh random id. Uniqueness against the catalog is the
    /// allocator's job, not this function's.
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Parse and validate an id string.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.len() != ID_LEN {
            return Err(IdError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdError::InvalidHex);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FileId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FileId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.0
    }
}

impl AsRef<str> for FileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
