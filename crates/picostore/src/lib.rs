//! File store for pico-cdn.
//!
//! Uploaded files get a random 128-bit identifier, land on disk under the
//! store root, and are tracked in a single JSON catalog.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use picostore::{FileStore, Store, StoreConfig};
//!
//! // Root from PICO_STORE, or the per-user data directory
//! let config = StoreConfig::from_env().unwrap();
//! let store = FileStore::open(config).unwrap();
//!
//! // Or at a specific path
//! let store = FileStore::at_path("/data/pico-cdn").unwrap();
//!
//! let id = store.store_file(&mut &b"Hello, World!"[..]).unwrap();
//! let path = store.file_path(id.as_str()).unwrap();
//! println!("{} stored at {}", id, path.display());
//! ```
//!
//! # Replication
//!
//! A slave node opens the same layout from a directory kept in sync by an
//! external tool and calls [`FileStore::refresh`] to see new uploads. The
//! store behaves the same on both sides; only the gateway differs.
//!
//! # Known gaps
//!
//! - A zero-byte upload is stored but can never be resolved, because a
//!   completed empty file and a pending reservation both have size 0.
//! - A failed write keeps its reservation and partial file.
//! - The allocator reserves the id it is holding for the next upload, and
//!   every flush persists that placeholder. Each restart therefore leaves
//!   one unused reservation in the catalog.

pub mod allocator;
pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod id;
pub mod store;

pub use allocator::IdAllocator;
pub use catalog::{Catalog, CatalogStats};
pub use config::StoreConfig;
pub use descriptor::FileDescriptor;
pub use error::{Result, StoreError};
pub use id::{FileId, IdError};
pub use store::{FileStore, Store};
