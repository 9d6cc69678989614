//! Node configuration: role, bind address and store location.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use picostore::StoreConfig;

/// Default cap on an upload request body.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 << 20;

/// Default interval between catalog refreshes on a slave.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Which routes a node serves. The store underneath is the same either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeMode {
    /// Accepts uploads guarded by `upload_key` and serves downloads.
    Master { upload_key: String },
    /// Serves downloads from a replicated store directory.
    Slave,
}

impl NodeMode {
    pub fn name(&self) -> &'static str {
        match self {
            NodeMode::Master { .. } => "master",
            NodeMode::Slave => "slave",
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, NodeMode::Master { .. })
    }
}

/// Everything a node needs to start.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind: SocketAddr,
    pub store: StoreConfig,
    pub mode: NodeMode,
    pub max_upload_bytes: usize,
    /// How often a slave re-reads the catalog. Unused on a master.
    pub refresh_interval: Duration,
}

/// Parse a listen address. A bare `:port` listens on all interfaces.
pub fn parse_network(network: &str) -> Result<SocketAddr> {
    let addr = if network.starts_with(':') {
        format!("0.0.0.0{network}")
    } else {
        network.to_string()
    };
    addr.parse()
        .with_context(|| format!("invalid listen address: {network}"))
}
