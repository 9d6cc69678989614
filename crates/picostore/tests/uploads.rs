//! Store behavior across threads and restarts, through the public API only.

use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use picostore::{Catalog, FileStore, Store};
use tempfile::TempDir;

#[test]
fn test_stored_bytes_round_trip() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileStore::at_path(temp_dir.path())?;

    let payloads: Vec<Vec<u8>> = vec![
        vec![0x00],
        b"plain text".to_vec(),
        (0..=255u8).collect(),
        vec![0xAB; 256 * 1024],
    ];

    for payload in payloads {
        let id = store.store_file(&mut Cursor::new(payload.clone()))?;
        let path = store.file_path(id.as_str())?;
        assert_eq!(fs::read(path)?, payload);
    }
    Ok(())
}

#[test]
fn test_concurrent_uploads_get_distinct_ids() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = Arc::new(FileStore::at_path(temp_dir.path())?);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || {
                let body = format!("upload number {i}");
                let id = store
                    .store_file(&mut Cursor::new(body.clone().into_bytes()))
                    .expect("store failed");
                (id, body)
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let (id, body) = handle.join().unwrap();
        assert_eq!(fs::read_to_string(store.file_path(id.as_str())?)?, body);
        assert!(ids.insert(id));
    }
    assert_eq!(ids.len(), 16);
    assert_eq!(store.stats()?.completed, 16);
    Ok(())
}

#[test]
fn test_catalog_survives_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let before = {
        let store = FileStore::at_path(temp_dir.path())?;
        for n in 0..5u8 {
            store.store_file(&mut Cursor::new(vec![n + 1; 10]))?;
        }
        store.catalog().completed()?
    };

    let store = FileStore::at_path(temp_dir.path())?;
    assert_eq!(store.catalog().completed()?, before);

    // the document itself restores to the same completed set
    let document = fs::read_to_string(temp_dir.path().join("db"))?;
    let restored = Catalog::restore(temp_dir.path().join("db"), &document)?;
    assert_eq!(restored.completed()?, before);
    Ok(())
}

#[test]
fn test_replica_sees_uploads_after_refresh() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let master = FileStore::at_path(temp_dir.path())?;
    let replica = FileStore::at_path(temp_dir.path())?;

    let id = master.store_file(&mut Cursor::new(b"replicated".to_vec()))?;
    assert!(replica.file_path(id.as_str()).unwrap_err().is_not_found());

    assert_eq!(replica.refresh()?, 1);
    assert_eq!(fs::read(replica.file_path(id.as_str())?)?, b"replicated");
    Ok(())
}
