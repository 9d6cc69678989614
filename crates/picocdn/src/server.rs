//! Node lifecycle: open the store, serve HTTP, keep slave catalogs fresh.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use picostore::FileStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{NodeConfig, NodeMode};
use crate::web::{self, WebState};

/// Run a node until `shutdown` is cancelled.
pub async fn run(config: NodeConfig, shutdown: CancellationToken) -> Result<()> {
    let store_root = config.store.base_path.clone();
    let store = Arc::new(
        FileStore::open(config.store.clone())
            .with_context(|| format!("Failed to open store at {}", store_root.display()))?,
    );

    if let NodeMode::Slave = config.mode {
        spawn_refresh_task(store.clone(), config.refresh_interval, shutdown.clone());
    }

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    let local_addr = listener.local_addr()?;

    info!(
        mode = config.mode.name(),
        addr = %local_addr,
        store = %store_root.display(),
        "pico-cdn listening"
    );

    let state = WebState {
        store,
        mode: config.mode,
        max_upload_bytes: config.max_upload_bytes,
    };

    axum::serve(listener, web::router(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Server shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    info!("pico-cdn stopped");
    Ok(())
}

/// Periodically merge uploads a master wrote into the shared catalog.
fn spawn_refresh_task(store: Arc<FileStore>, every: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let store = store.clone();
                    match tokio::task::spawn_blocking(move || store.refresh()).await {
                        Ok(Ok(0)) => {}
                        Ok(Ok(merged)) => info!(merged, "catalog refreshed"),
                        Ok(Err(e)) => tracing::warn!(error = %e, "catalog refresh failed"),
                        Err(e) => tracing::error!(error = %e, "catalog refresh task panicked"),
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use picostore::{Store, StoreConfig};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn node(root: &std::path::Path, mode: NodeMode) -> NodeConfig {
        NodeConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            store: StoreConfig::with_base_path(root),
            mode,
            max_upload_bytes: crate::config::DEFAULT_MAX_UPLOAD_BYTES,
            refresh_interval: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let temp_dir = TempDir::new().unwrap();
        let shutdown = CancellationToken::new();
        let config = node(
            temp_dir.path(),
            NodeMode::Master {
                upload_key: "k".into(),
            },
        );

        let handle = tokio::spawn(run(config, shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
        assert!(temp_dir.path().join("raw").is_dir());
    }

    #[tokio::test]
    async fn test_run_fails_on_corrupt_catalog() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("db"), b"{broken").unwrap();

        let err = run(node(temp_dir.path(), NodeMode::Slave), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open store"));
    }

    #[tokio::test]
    async fn test_refresh_task_picks_up_master_uploads() {
        let temp_dir = TempDir::new().unwrap();
        let replica = Arc::new(FileStore::at_path(temp_dir.path()).unwrap());
        let shutdown = CancellationToken::new();
        spawn_refresh_task(replica.clone(), Duration::from_millis(20), shutdown.clone());

        let master = FileStore::at_path(temp_dir.path()).unwrap();
        let id = master.store_file(&mut Cursor::new(b"fresh".to_vec())).unwrap();

        let mut found = false;
        for _ in 0..100 {
            if replica.file_path(id.as_str()).is_ok() {
                found = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        shutdown.cancel();
        assert!(found, "replica never saw the upload");
    }
}
