//! Identifier allocator.
//!
//! A single background thread generates random ids, reserves each one in the
//! catalog, and then offers it on a zero-capacity channel. The send blocks
//! until a caller asks for an id, so generation runs at the pace of uploads
//! and at most one reserved id is ever waiting for a taker.
//!
//! The reservation happens before the handoff. Whoever receives an id can
//! therefore always complete it, and no later iteration can produce a
//! colliding token because the key is already in the catalog.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::catalog::Catalog;
use crate::error::{Result, StoreError};
use crate::id::FileId;

const THREAD_NAME: &str = "pico-id-allocator";

/// Hands out catalog-unique identifiers, one per call.
#[derive(Debug)]
pub struct IdAllocator {
    ids: Mutex<Receiver<FileId>>,
}

impl IdAllocator {
    /// Start the allocator thread with random v4-derived ids.
    pub fn start(catalog: Arc<Catalog>) -> Result<Self> {
        Self::with_generator(catalog, FileId::random)
    }

    /// Start the allocator thread with a custom id source.
    pub fn with_generator<G>(catalog: Arc<Catalog>, generate: G) -> Result<Self>
    where
        G: FnMut() -> FileId + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(0);
        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(&catalog, tx, generate))
            .map_err(StoreError::AllocatorSpawn)?;

        Ok(Self { ids: Mutex::new(rx) })
    }

    /// Block until the allocator hands over an identifier.
    ///
    /// The returned id is already reserved in the catalog.
    pub fn next(&self) -> Result<FileId> {
        let ids = self.ids.lock().map_err(|_| StoreError::LockPoisoned)?;
        ids.recv().map_err(|_| StoreError::AllocatorStopped)
    }
}

fn run<G>(catalog: &Catalog, tx: SyncSender<FileId>, mut generate: G)
where
    G: FnMut() -> FileId,
{
    tracing::debug!("id allocator started");
    loop {
        let id = generate();

        match catalog.contains(&id) {
            Ok(false) => {}
            Ok(true) => {
                tracing::warn!(%id, "generated id already in catalog, retrying");
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "id allocator cannot read catalog, stopping");
                return;
            }
        }

        match catalog.reserve(&id) {
            Ok(()) => {}
            Err(StoreError::DuplicateId(_)) => continue,
            Err(e) => {
                tracing::error!(error = %e, "id allocator cannot reserve, stopping");
                return;
            }
        }

        if tx.send(id).is_err() {
            tracing::debug!("id allocator receiver closed, exiting");
            return;
        }
    }
}
