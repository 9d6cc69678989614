//! pico-cdn - damn small CDN
//!
//! Subcommands:
//! - `pico-cdn master` - accept uploads and serve files
//! - `pico-cdn slave` - serve files from a replicated store

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use picocdn::config::{
    parse_network, NodeConfig, NodeMode, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_REFRESH_INTERVAL,
};
use picocdn::{server, telemetry};
use picostore::StoreConfig;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "pico-cdn")]
#[command(about = "Damn small CDN: upload files over HTTP, serve them back by id")]
#[command(version)]
struct Cli {
    /// Listen address; a bare ":port" binds all interfaces
    #[arg(long, global = true, env = "PICO_INTERFACE", default_value = ":8080")]
    network: String,

    /// OTLP gRPC endpoint for span export (e.g., "localhost:4317")
    #[arg(long, global = true, env = "PICO_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// TOML file with a [store] section
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Accept uploads and serve files
    #[command(visible_alias = "m")]
    Master {
        #[command(flatten)]
        store: StoreArgs,

        /// Secret required on every upload
        #[arg(long, env = "PICO_UPLOAD_KEY", default_value = "secret")]
        upload_key: String,

        /// Largest accepted upload request, in bytes
        #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload_bytes: usize,
    },

    /// Serve files from a store replicated from a master
    #[command(visible_alias = "s")]
    Slave {
        #[command(flatten)]
        store: StoreArgs,

        /// Seconds between catalog refreshes
        #[arg(long, default_value_t = DEFAULT_REFRESH_INTERVAL.as_secs())]
        refresh_secs: u64,
    },
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Store root directory
    #[arg(long, env = "PICO_STORE")]
    store: Option<PathBuf>,
}

impl Cli {
    fn node_config(&self) -> Result<NodeConfig> {
        let bind = parse_network(&self.network)?;

        let (store_args, mode, max_upload_bytes, refresh_interval) = match &self.command {
            Commands::Master {
                store,
                upload_key,
                max_upload_bytes,
            } => (
                store,
                NodeMode::Master {
                    upload_key: upload_key.clone(),
                },
                *max_upload_bytes,
                DEFAULT_REFRESH_INTERVAL,
            ),
            Commands::Slave {
                store,
                refresh_secs,
            } => {
                anyhow::ensure!(*refresh_secs > 0, "--refresh-secs must be at least 1");
                (
                    store,
                    NodeMode::Slave,
                    DEFAULT_MAX_UPLOAD_BYTES,
                    Duration::from_secs(*refresh_secs),
                )
            }
        };

        let store = match (&store_args.store, &self.config) {
            (Some(path), _) => StoreConfig::with_base_path(path),
            (None, Some(file)) => StoreConfig::from_file(file)?,
            (None, None) => StoreConfig::from_env()?,
        };

        Ok(NodeConfig {
            bind,
            store,
            mode,
            max_upload_bytes,
            refresh_interval,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let telemetry = telemetry::init(cli.otlp_endpoint.as_deref(), cli.quiet)
        .context("Failed to initialize telemetry")?;

    let config = cli.node_config()?;

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let result = server::run(config, shutdown).await;

    telemetry.shutdown()?;
    result
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    let terminate = async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable");
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        std::future::pending::<()>().await;
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
    }
    shutdown.cancel();
}
