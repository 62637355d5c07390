//! Concurrent daemon storage with per-server locking.
//!
//! [`TrackerRegistry`] stores one [`TrackerDaemon`] per server, each behind
//! its own [`tokio::sync::Mutex`]. Cycles of different servers never
//! contend; a second cycle of the same server sees the lock held.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::daemon::TrackerDaemon;
use crate::domain::ServerRegion;
use crate::error::TrackerError;

/// Central store for all enabled servers' daemons.
#[derive(Debug)]
pub struct TrackerRegistry {
    daemons: RwLock<HashMap<ServerRegion, Arc<Mutex<TrackerDaemon>>>>,
}

impl TrackerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            daemons: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a daemon under its server.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Config`] if the server is already registered.
    pub async fn insert(&self, daemon: TrackerDaemon) -> Result<ServerRegion, TrackerError> {
        let server = daemon.server();
        let mut map = self.daemons.write().await;
        if map.contains_key(&server) {
            return Err(TrackerError::Config(format!(
                "server {server} registered twice"
            )));
        }
        map.insert(server, Arc::new(Mutex::new(daemon)));
        Ok(server)
    }

    /// Returns the daemon of `server` behind its lock.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UnknownServer`] if the server is not enabled.
    pub async fn get(&self, server: ServerRegion) -> Result<Arc<Mutex<TrackerDaemon>>, TrackerError> {
        let map = self.daemons.read().await;
        map.get(&server)
            .map(Arc::clone)
            .ok_or_else(|| TrackerError::UnknownServer(server.to_string()))
    }

    /// Registered servers in a stable order.
    pub async fn servers(&self) -> Vec<ServerRegion> {
        let map = self.daemons.read().await;
        let mut servers: Vec<ServerRegion> = map.keys().copied().collect();
        servers.sort();
        servers
    }

    /// Returns the number of registered servers.
    pub async fn len(&self) -> usize {
        self.daemons.read().await.len()
    }

    /// Returns `true` if no server is registered.
    pub async fn is_empty(&self) -> bool {
        self.daemons.read().await.is_empty()
    }
}

impl Default for TrackerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
