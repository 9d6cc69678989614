//! Store configuration with environment variable and file-based loading.
//!
//! Environment variables:
//! - `PICO_STORE`: Root directory of the store
//!
//! Default root: the per-user data directory (`<data_dir>/pico-cdn`), or
//! `/data/pico-cdn` when no home directory can be determined.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Subdirectory holding uploaded bytes, one file per id.
pub const RAW_DIR: &str = "raw";

/// Catalog document name inside the store root.
pub const CATALOG_FILE: &str = "db";

/// Fallback root used when no per-user directory is available.
pub const FALLBACK_STORE_PATH: &str = "/data/pico-cdn";

/// Configuration for a file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root of the store.
    /// Files go to `{base_path}/raw/`, the catalog to `{base_path}/db`.
    pub base_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "pico-cdn")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_STORE_PATH))
}

impl StoreConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let base_path = env::var("PICO_STORE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_store_path());

        Ok(Self { base_path })
    }

    /// Load configuration from a TOML file, falling back to environment.
    ///
    /// The file should contain a `[store]` section:
    /// ```toml
    /// [store]
    /// base_path = "/data/pico-cdn"
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let table: toml::Table = contents
            .parse()
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;

        match table.get("store") {
            Some(section) => section
                .clone()
                .try_into()
                .context("failed to parse [store] section"),
            None => Self::from_env(),
        }
    }

    pub fn with_base_path(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
        }
    }

    /// Directory holding raw uploaded files.
    pub fn raw_dir(&self) -> PathBuf {
        self.base_path.join(RAW_DIR)
    }

    /// Path of the catalog document.
    pub fn catalog_path(&self) -> PathBuf {
        self.base_path.join(CATALOG_FILE)
    }
}
